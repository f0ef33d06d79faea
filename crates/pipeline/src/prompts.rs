//! Instructions sent to the generative model.
//!
//! Every prompt that expects structured output names the exact JSON keys
//! the caller parses, so the wording here and the parsers in the stages
//! change together.

use roomcraft_core::catalog::RoomKind;
use roomcraft_core::project::{Budget, PlanItem, Product};

/// Budget sentence used in the category prompt.
pub fn budget_context(budget: Budget) -> String {
    match budget.as_amount() {
        Some(amount) => format!(
            "Keep the total cost around {}€. Select items that are affordable but good quality.",
            format_amount(amount)
        ),
        None => "Select premium, high-quality items. Budget is flexible.".to_string(),
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

pub fn plan_prompt(room_type: &str, style: &str, budget: Budget, has_image: bool) -> String {
    let subject = if has_image {
        format!("Analyze this {room_type} image and create a furnishing plan")
    } else {
        format!("Create a furnishing plan for a {room_type}")
    };
    format!(
        "You are an expert interior architect. {subject} to achieve a \"{style}\" style.\n\
         {budget}\n\
         List 8-12 essential items (furniture, lighting, rugs, key decor).\n\
         For each item provide \"item\" (generic name, e.g. \"Corner Sofa\"), \
         \"reason\" (why it fits the space and style) and \"placement\" (where it goes, e.g. \"Left wall\").\n\
         Return a JSON object with a \"plan\" key holding the array of items. Respond with JSON only.",
        budget = budget_context(budget),
    )
}

// ---------------------------------------------------------------------------
// Shop
// ---------------------------------------------------------------------------

const CANDIDATE_FIELDS: &str = "For EACH item, provide:\n\
     1. \"category\": the type of item (e.g. \"Sofa\", \"Lamp\", \"Rug\")\n\
     2. \"searchTerm\": a precise shopping search query in the search language\n\
     3. \"visual_description\": a detailed visual description for image generation\n\
     4. \"priority\": 1 for the most important item, increasing from there\n\
     Return a JSON array of objects.";

/// Category prompt when sourcing from a furnishing plan.
pub fn categories_from_plan_prompt(
    plan: &[PlanItem],
    style: &str,
    budget: Budget,
    language: &str,
    max_candidates: usize,
) -> String {
    let items = plan
        .iter()
        .take(max_candidates)
        .map(|p| {
            if p.reason.is_empty() {
                p.item.clone()
            } else {
                format!("{} ({})", p.item, p.reason)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are an expert interior designer. For this \"{style}\" style room, \
         suggest specific product search terms for:\n{items}\n\
         {budget}\n\
         Write every searchTerm in language \"{language}\".\n\
         {CANDIDATE_FIELDS}",
        budget = budget_context(budget),
    )
}

/// Category prompt when there is no plan ("category mode").
pub fn categories_for_room_prompt(
    room_type: &str,
    style: &str,
    budget: Budget,
    language: &str,
    max_candidates: usize,
) -> String {
    let focus = RoomKind::classify(room_type).category_focus();
    format!(
        "You are an expert interior designer. Suggest {max_candidates} product search terms \
         for a \"{style}\" style \"{room_type}\".\n\
         Focus on: {focus}.\n\
         {budget}\n\
         Write every searchTerm in language \"{language}\".\n\
         {CANDIDATE_FIELDS}",
        budget = budget_context(budget),
    )
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

/// Render instruction. With a photo the model is held to the room's
/// geometry; without one it composes a new room.
pub fn render_prompt(room_type: &str, style: &str, vision: &str, has_image: bool) -> String {
    if has_image {
        format!(
            "TASK: Transform this {room_type} into {style} design.\n\n\
             USER VISION: {vision}\n\n\
             STRICT RULES - NEVER BREAK:\n\
             - KEEP exact room dimensions, walls, ceiling, floor positions\n\
             - KEEP same camera angle and perspective\n\
             - KEEP all windows and doors in exact positions\n\
             - KEEP original lighting direction\n\n\
             YOU CAN CHANGE:\n\
             - Wall colors and textures\n\
             - Floor materials\n\
             - All furniture\n\
             - Decor, plants, textiles\n\
             - Light fixtures (same positions)\n\n\
             STYLE: Apply authentic {style} design\n\
             QUALITY: Photorealistic, 8K, professional interior photography\n\n\
             Generate the transformed room."
        )
    } else {
        format!(
            "Create a photorealistic {room_type} interior, {style} style. {vision}. \
             Professional interior photography, 8K quality, natural lighting, \
             Architectural Digest quality."
        )
    }
}

/// Instruction derived from a plan and the sourced products, used when the
/// caller supplies none.
pub fn derived_instruction(style: &str, plan: &[PlanItem], products: &[Product]) -> String {
    let mut out = format!("A {style} redesign.");
    if !plan.is_empty() {
        let items = plan
            .iter()
            .map(|p| {
                if p.placement.is_empty() {
                    p.item.clone()
                } else {
                    format!("{} ({})", p.item, p.placement)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(" Furnish with: {items}."));
    }
    if !products.is_empty() {
        let refs = products
            .iter()
            .map(|p| {
                if p.visual_description.is_empty() {
                    p.name.clone()
                } else {
                    format!("{}: {}", p.name, p.visual_description)
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
        out.push_str(&format!(
            " Use the attached product photos as references for: {refs}."
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// Assistant
// ---------------------------------------------------------------------------

pub fn enhance_prompt(user_prompt: &str, room_type: &str) -> String {
    let room = if room_type.trim().is_empty() { "room" } else { room_type };
    format!(
        "You are an interior design expert. Analyze and improve the description of a renovation project.\n\n\
         CONTEXT:\n\
         - Room type: {room}\n\
         - User description: \"{user_prompt}\"\n\n\
         Return a JSON object with:\n\
         1. \"isComplete\" (boolean): true if the description has enough detail (colors, materials, mood)\n\
         2. \"score\" (1-10): quality of the description\n\
         3. \"missingElements\" (array): missing elements among [colors, materials, mood, style, lighting, furniture]\n\
         4. \"enhancedPrompt\" (string): an improved, professional English version for image generation, \
         precise about textures, colors and materials, at most 200 words\n\
         5. \"suggestions\" (array): 2-3 questions or suggestions when score < 7\n\n\
         Respond with valid JSON only, no markdown."
    )
}

pub fn analyze_room_prompt() -> String {
    "Analyze this photo of an interior room.\n\
     Identify:\n\
     1. The room type (living room, kitchen, etc.)\n\
     2. The current style (dated, modern, etc.)\n\
     3. The overall condition.\n\
     4. Three concrete renovation proposals to modernize the room.\n\
     5. An estimated price range for this work in France, in euros.\n\n\
     Respond with strict JSON:\n\
     {\n  \"roomType\": \"string\",\n  \"currentStyle\": \"string\",\n  \"condition\": \"string\",\n  \
     \"proposals\": [\"string\", \"string\", \"string\"],\n  \"estimatedCost\": \"string\"\n}"
        .to_string()
}

/// One line of chat history.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatTurn {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

/// What the assistant knows about the room being discussed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoomContext {
    #[serde(default, alias = "roomType")]
    pub room_type: Option<String>,
    #[serde(default, alias = "currentStyle")]
    pub current_style: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

pub fn assistant_prompt(context: &RoomContext, history: &[ChatTurn]) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".into());
    let transcript = history
        .iter()
        .map(|t| {
            let who = if t.role == "user" { "User" } else { "Assistant" };
            format!("{who}: {}", t.content)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a design assistant, an expert in interior architecture and decoration.\n\n\
         PROJECT CONTEXT:\n\
         - Room: {room}\n\
         - Current style: {style}\n\
         - Condition: {condition}\n\n\
         If the user asks to change the style or colors, or to add a piece of furniture, answer with\n\
         {{\"action\": \"generate_image\", \"imagePrompt\": \"<photorealistic description of the updated room>\", \
         \"message\": \"<short reply to the user>\"}}\n\
         Otherwise answer with {{\"action\": \"chat\", \"message\": \"<your reply>\"}}.\n\
         Always answer in strict JSON.\n\n\
         CONVERSATION:\n{transcript}\nAssistant:",
        room = field(&context.room_type),
        style = field(&context.current_style),
        condition = field(&context.condition),
    )
}
