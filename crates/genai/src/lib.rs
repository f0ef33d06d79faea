//! Generative model collaborator.
//!
//! The pipeline talks to [`GenerativeModel`]; [`GeminiClient`] implements
//! it over the Gemini `generateContent` REST endpoint.

pub mod error;
pub mod gemini;
pub mod model;

pub use error::GenAiError;
pub use gemini::{GeminiClient, GeminiConfig};
pub use model::{
    FinishReason, GenerateRequest, GenerateResponse, GenerativeModel, InlineImage, Modality,
};
