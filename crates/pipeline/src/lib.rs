//! The room restyling pipeline.
//!
//! [`Orchestrator`] sequences the Plan, Shop and Render stages for a
//! pending project and records the outcome on the project document. Each
//! stage is also usable on its own for the synchronous studio endpoints.
//! Collaborators (model, search, image fetcher, blob store) are injected
//! through [`Collaborators`].

pub mod assets;
pub mod assistant;
pub mod brief;
pub mod config;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod plan;
pub mod prompts;
pub mod render;
pub mod shop;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use assets::AssetPersister;
pub use assistant::{Assistant, AssistantAction, AssistantReply, PromptReview, RoomAnalysis};
pub use brief::RoomBrief;
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use fetch::{FetchedImage, HttpImageFetcher, ImageFetcher};
pub use orchestrator::{Collaborators, Orchestrator, RunOutcome};
pub use plan::PlanStage;
pub use prompts::{ChatTurn, RoomContext};
pub use render::{RenderRequest, RenderStage, RenderedImage};
pub use shop::{Candidate, ShopStage};
