//! Product catalogue heuristics: image acceptance, title cleaning, source
//! hostnames and the per-room category lists used when there is no
//! furnishing plan to source from.

use url::Url;

/// Substrings that mark an image URL as a logo, icon, or placeholder
/// rather than a product photo. Entries starting with `.` are matched as a
/// file extension at the end of the URL path.
pub const DEFAULT_IMAGE_BLOCKLIST: &[&str] = &[
    "logo",
    "icon",
    "favicon",
    "social_share",
    ".svg",
    "/assets/",
    "range-categorisation",
    "placeholder",
];

// ---------------------------------------------------------------------------
// Image filter
// ---------------------------------------------------------------------------

/// Decides whether a candidate image URL is usable as a product image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFilter {
    substrings: Vec<String>,
    extensions: Vec<String>,
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::from_list(DEFAULT_IMAGE_BLOCKLIST.iter().copied())
    }
}

impl ImageFilter {
    /// Build a filter from custom blocklist entries. Matching is
    /// case-insensitive; blank entries are ignored.
    pub fn from_list<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut substrings = Vec::new();
        let mut extensions = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim().to_ascii_lowercase();
            if entry.is_empty() {
                continue;
            }
            if entry.starts_with('.') {
                extensions.push(entry);
            } else {
                substrings.push(entry);
            }
        }
        Self {
            substrings,
            extensions,
        }
    }

    /// Parse a comma-separated override such as `"logo,icon,.svg"`.
    pub fn from_csv(csv: &str) -> Self {
        Self::from_list(csv.split(','))
    }

    /// True when `url` is an absolute http(s) URL that matches no
    /// blocklist entry.
    pub fn accepts(&self, url: &str) -> bool {
        let url = url.trim();
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }

        let lowered = url.to_ascii_lowercase();
        if self.substrings.iter().any(|s| lowered.contains(s.as_str())) {
            return false;
        }

        let path = parsed.path().to_ascii_lowercase();
        !self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// The first URL from `candidates` that passes the filter.
    pub fn first_acceptable<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates.into_iter().find(|u| self.accepts(u))
    }
}

// ---------------------------------------------------------------------------
// Titles and hosts
// ---------------------------------------------------------------------------

/// Strip the retailer suffix search engines append to page titles
/// (`"Chaise Oslo - Maisons du Monde"`, `"Lampe | IKEA"`).
pub fn clean_product_title(title: &str) -> String {
    let head = title.split(" - ").next().unwrap_or(title);
    let head = head.split(" | ").next().unwrap_or(head);
    let cleaned = head.trim();
    if cleaned.is_empty() {
        title.trim().to_string()
    } else {
        cleaned.to_string()
    }
}

/// Hostname of a product page without the `www.` prefix.
pub fn source_hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase())
}

// ---------------------------------------------------------------------------
// Room categories
// ---------------------------------------------------------------------------

/// Coarse room kinds recognised for category mode. Anything else maps to
/// [`RoomKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomKind {
    LivingRoom,
    Kitchen,
    Bedroom,
    Bathroom,
    Office,
    DiningRoom,
    Other,
}

impl RoomKind {
    /// Classify a free-text room type (`"living_room"`, `"Chambre"`, ...).
    pub fn classify(room_type: &str) -> Self {
        let normalized: String = room_type
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();
        match normalized.as_str() {
            "living room" | "living" | "lounge" | "salon" | "séjour" => Self::LivingRoom,
            "kitchen" | "cuisine" => Self::Kitchen,
            "bedroom" | "chambre" => Self::Bedroom,
            "bathroom" | "salle de bain" | "salle de bains" => Self::Bathroom,
            "office" | "home office" | "bureau" => Self::Office,
            "dining room" | "salle à manger" => Self::DiningRoom,
            _ => Self::Other,
        }
    }

    /// Prompt phrase naming the product families to focus on.
    pub fn category_focus(self) -> &'static str {
        match self {
            Self::Kitchen => "bar stools, lighting, appliances, and decor",
            Self::Bedroom => "bed frame, nightstands, lighting, and rugs",
            Self::Bathroom => "vanity accessories, mirrors, lighting, and storage",
            Self::Office => "desk, office chair, lighting, and organization",
            Self::LivingRoom => "sofa, armchair, coffee table, lighting, and rugs",
            Self::DiningRoom => "dining table, chairs, pendant lighting, and sideboard",
            Self::Other => "furniture, lighting, and decor",
        }
    }

    /// Category keywords in priority order (index 0 is priority 1).
    pub fn priority_categories(self) -> &'static [&'static str] {
        match self {
            Self::LivingRoom => &["sofa", "armchair", "coffee table", "floor lamp", "rug", "shelving"],
            Self::Kitchen => &["bar stool", "pendant light", "kitchen table", "storage", "decor"],
            Self::Bedroom => &["bed", "nightstand", "dresser", "lamp", "rug"],
            Self::Bathroom => &["vanity", "mirror", "wall light", "storage", "towel rack"],
            Self::Office => &["desk", "office chair", "desk lamp", "bookcase", "organizer"],
            Self::DiningRoom => &["dining table", "dining chair", "pendant light", "sideboard", "rug"],
            Self::Other => &["furniture", "lighting", "decor"],
        }
    }
}
