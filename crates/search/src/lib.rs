//! Web search collaborator.
//!
//! [`ProductSearch`] is what the Shop stage queries. [`GoogleCseClient`]
//! implements it over the Google Custom Search JSON API and maps each
//! item's untyped `pagemap` into a typed [`SearchResult`].

pub mod cse;
pub mod error;
pub mod pagemap;
pub mod types;

pub use cse::{CseConfig, DisabledSearch, GoogleCseClient};
pub use error::SearchError;
pub use types::{Locale, PriceHints, ProductSearch, SearchQuery, SearchResult};
