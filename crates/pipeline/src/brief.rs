use roomcraft_core::project::{Budget, Project};
use serde::{Deserialize, Serialize};

/// The room being restyled: everything the stages need from a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomBrief {
    #[serde(default, alias = "originalImageUrl")]
    pub original_image_url: Option<String>,
    #[serde(alias = "roomType")]
    pub room_type: String,
    pub style: String,
    #[serde(default)]
    pub budget: Budget,
}

impl RoomBrief {
    pub fn new(room_type: impl Into<String>, style: impl Into<String>, budget: Budget) -> Self {
        Self {
            original_image_url: None,
            room_type: room_type.into(),
            style: style.into(),
            budget,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.original_image_url = Some(url.into());
        self
    }

    /// The photo URL, ignoring blank values.
    pub fn image_url(&self) -> Option<&str> {
        self.original_image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

impl From<&Project> for RoomBrief {
    fn from(project: &Project) -> Self {
        Self {
            original_image_url: project.original_image_url.clone(),
            room_type: project.room_type.clone(),
            style: project.style.clone(),
            budget: project.budget,
        }
    }
}
