//! Scripted collaborators for tests.
//!
//! Compiled for this crate's own tests and, behind the `test-support`
//! feature, for the worker and API test suites. Each double records what it
//! was asked so tests can assert on call counts and query ladders.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use roomcraft_db::BlobStore;
use roomcraft_genai::{
    FinishReason, GenAiError, GenerateRequest, GenerateResponse, GenerativeModel, InlineImage,
};
use roomcraft_search::{PriceHints, ProductSearch, SearchError, SearchQuery, SearchResult};

use crate::error::PipelineError;
use crate::fetch::{FetchedImage, ImageFetcher};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Smallest byte string that sniffs as JPEG.
pub fn fake_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    bytes.extend_from_slice(b"JFIF\0");
    bytes.extend_from_slice(&[0u8; 16]);
    bytes
}

/// Smallest byte string that sniffs as PNG.
pub fn fake_png() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 16]);
    bytes
}

/// Search hit with one image and no price metadata.
pub fn result(title: &str, link: &str, image: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        link: link.to_string(),
        snippet: String::new(),
        images: vec![image.to_string()],
        price_hints: PriceHints::default(),
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// What a model request is for, recognised from its instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Plan,
    Categories,
    Render,
    Enhance,
    Chat,
    Analyze,
    Other,
}

impl CallKind {
    pub fn of(request: &GenerateRequest) -> Self {
        let text = request.instruction.as_str();
        if request.wants_image() {
            Self::Render
        } else if text.contains("searchTerm") {
            Self::Categories
        } else if text.contains("enhancedPrompt") {
            Self::Enhance
        } else if text.contains("generate_image") {
            Self::Chat
        } else if text.contains("estimatedCost") {
            Self::Analyze
        } else if text.contains("\"plan\"") {
            Self::Plan
        } else {
            Self::Other
        }
    }
}

/// Canned model answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// An image part plus a short caption.
    Image(Vec<u8>),
    Blocked,
    /// Finished normally but without an image part.
    NoImage(String),
    Timeout,
    Unavailable,
    /// The model call panics.
    Panic,
}

impl Reply {
    fn into_result(self) -> Result<GenerateResponse, GenAiError> {
        match self {
            Reply::Text(text) => Ok(GenerateResponse {
                text_parts: vec![text],
                image_parts: Vec::new(),
                finish_reason: Some(FinishReason::Stop),
            }),
            Reply::Image(bytes) => {
                let mime = crate::fetch::sniff_content_type(&bytes).unwrap_or("image/png");
                Ok(GenerateResponse {
                    text_parts: vec!["Here is the redesigned room.".into()],
                    image_parts: vec![InlineImage::new(bytes, mime)],
                    finish_reason: Some(FinishReason::Stop),
                })
            }
            Reply::Blocked => Ok(GenerateResponse {
                text_parts: Vec::new(),
                image_parts: Vec::new(),
                finish_reason: Some(FinishReason::Safety),
            }),
            Reply::NoImage(text) => Ok(GenerateResponse {
                text_parts: vec![text],
                image_parts: Vec::new(),
                finish_reason: Some(FinishReason::Stop),
            }),
            Reply::Timeout => Err(GenAiError::Timeout),
            Reply::Unavailable => Err(GenAiError::Unavailable("scripted outage".into())),
            Reply::Panic => panic!("scripted model panic"),
        }
    }
}

/// A request the scripted model received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub instruction: String,
    pub image_count: usize,
}

/// [`GenerativeModel`] answering from a per-kind script.
///
/// Replies queued with [`then`](Self::then) are consumed in order; the
/// reply set with [`on`](Self::on) answers every call of that kind once the
/// queue is empty. Unscripted kinds fail as unavailable.
#[derive(Default)]
pub struct ScriptedModel {
    standing: HashMap<CallKind, Reply>,
    queued: Mutex<HashMap<CallKind, VecDeque<Reply>>>,
    delays: HashMap<CallKind, Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model that plans `plan_items` items, suggests a search term per
    /// plan item and renders a PNG.
    pub fn happy_path(plan_items: usize) -> Self {
        let plan: Vec<_> = (1..=plan_items)
            .map(|i| {
                serde_json::json!({
                    "item": format!("Item {i}"),
                    "reason": "Fits the style",
                    "placement": "Left wall"
                })
            })
            .collect();
        let categories: Vec<_> = (1..=plan_items)
            .map(|i| {
                serde_json::json!({
                    "category": format!("category {i}"),
                    "searchTerm": format!("item {i}"),
                    "visual_description": format!("Item {i} in light oak"),
                    "priority": i
                })
            })
            .collect();
        Self::new()
            .on(
                CallKind::Plan,
                Reply::Text(format!(
                    "Here is the plan:\n```json\n{}\n```",
                    serde_json::json!({ "plan": plan })
                )),
            )
            .on(
                CallKind::Categories,
                Reply::Text(serde_json::Value::Array(categories).to_string()),
            )
            .on(CallKind::Render, Reply::Image(fake_png()))
    }

    /// Standing reply for every call of `kind`.
    pub fn on(mut self, kind: CallKind, reply: Reply) -> Self {
        self.standing.insert(kind, reply);
        self
    }

    /// One-shot reply consumed before the standing one.
    pub fn then(self, kind: CallKind, reply: Reply) -> Self {
        lock(&self.queued).entry(kind).or_default().push_back(reply);
        self
    }

    /// Delay every call of `kind` by `delay`.
    pub fn with_delay(mut self, kind: CallKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, kind: CallKind) -> usize {
        lock(&self.calls).iter().filter(|c| c.kind == kind).count()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GenAiError> {
        let kind = CallKind::of(&request);
        lock(&self.calls).push(RecordedCall {
            kind,
            instruction: request.instruction.clone(),
            image_count: request.images.len(),
        });

        if let Some(delay) = self.delays.get(&kind).copied() {
            match request.timeout {
                Some(limit) if limit < delay => {
                    tokio::time::sleep(limit).await;
                    return Err(GenAiError::Timeout);
                }
                _ => tokio::time::sleep(delay).await,
            }
        }

        let queued = lock(&self.queued).get_mut(&kind).and_then(VecDeque::pop_front);
        let reply = queued
            .or_else(|| self.standing.get(&kind).cloned())
            .unwrap_or(Reply::Unavailable);
        reply.into_result()
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// [`ProductSearch`] answering exact query strings from a table.
#[derive(Default)]
pub struct ScriptedSearch {
    results: HashMap<String, Vec<SearchResult>>,
    fallback: Vec<SearchResult>,
    failing: HashSet<String>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, results: Vec<SearchResult>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }

    /// Results for any query not listed explicitly.
    pub fn with_fallback(mut self, results: Vec<SearchResult>) -> Self {
        self.fallback = results;
        self
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// Every query text received, in order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl ProductSearch for ScriptedSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError> {
        lock(&self.queries).push(query.text.clone());
        if self.failing.contains(&query.text) {
            return Err(SearchError::Unavailable("scripted outage".into()));
        }
        Ok(self
            .results
            .get(&query.text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// [`ImageFetcher`] serving a fixed set of URLs.
///
/// URLs owned by an attached blob store are read from it, so images
/// persisted earlier in a run can be fetched back during rendering.
#[derive(Default)]
pub struct StaticFetcher {
    images: HashMap<String, Vec<u8>>,
    unreachable: HashSet<String>,
    blobs: Option<Arc<dyn BlobStore>>,
    counts: Mutex<HashMap<String, usize>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(url.to_string(), bytes);
        self
    }

    /// Make `url` fail the reachability check.
    pub fn with_unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        lock(&self.counts).get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedImage, PipelineError> {
        *lock(&self.counts).entry(url.to_string()).or_default() += 1;
        if let Some(blobs) = self.blobs.as_ref().filter(|b| b.owns(url)) {
            return FetchedImage::sniff(blobs.get(url).await?);
        }
        match self.images.get(url) {
            Some(bytes) => FetchedImage::sniff(bytes.clone()),
            None => Err(PipelineError::UpstreamUnavailable(format!(
                "GET {url} returned 404 Not Found"
            ))),
        }
    }

    async fn is_reachable(&self, url: &str, _timeout: Duration) -> bool {
        !self.unreachable.contains(url)
    }
}
