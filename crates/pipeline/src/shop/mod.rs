//! Shop stage: turn a plan (or just the room brief) into real, purchasable
//! products with displayable images.
//!
//! 1. One model call produces candidate (category, query, description,
//!    priority) tuples; malformed output falls back to candidates derived
//!    from the plan or from the room's priority categories.
//! 2. Candidates are sourced concurrently, each walking the query ladder.
//!    A failed candidate contributes nothing and never aborts the batch.
//! 3. Hits are priced, optionally link-checked, and their images re-hosted.
//!    Candidates without an acceptable image are dropped and the rest are
//!    sorted by priority.

pub mod candidates;
pub mod price;
pub mod sourcing;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use roomcraft_core::catalog::{clean_product_title, source_hostname};
use roomcraft_core::project::{sort_by_priority, PlanItem, Product};
use roomcraft_core::types::new_id;
use roomcraft_genai::{GenerateRequest, GenerativeModel};
use roomcraft_search::ProductSearch;

use crate::assets::AssetPersister;
use crate::brief::RoomBrief;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetch::ImageFetcher;
use crate::prompts;

pub use candidates::Candidate;
use sourcing::{SourcedHit, SourcingParams};

pub struct ShopStage {
    model: Arc<dyn GenerativeModel>,
    search: Arc<dyn ProductSearch>,
    fetcher: Arc<dyn ImageFetcher>,
    persister: Arc<AssetPersister>,
    config: Arc<PipelineConfig>,
}

impl ShopStage {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        search: Arc<dyn ProductSearch>,
        fetcher: Arc<dyn ImageFetcher>,
        persister: Arc<AssetPersister>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            model,
            search,
            fetcher,
            persister,
            config,
        }
    }

    /// Source products for `brief`. Never fails; the worst case is an
    /// empty list.
    pub async fn run(&self, brief: &RoomBrief, plan: &[PlanItem]) -> Vec<Product> {
        let candidates = self.candidates(brief, plan).await;
        let products = self.source_all(candidates).await;
        tracing::info!(stage = "shop", products = products.len(), "Products sourced");
        products
    }

    /// Candidate tuples for `brief`, at most `max_candidates` of them.
    pub async fn candidates(&self, brief: &RoomBrief, plan: &[PlanItem]) -> Vec<Candidate> {
        let mut candidates = match self.generate_candidates(brief, plan).await {
            Ok(c) if !c.is_empty() => c,
            Ok(_) => {
                tracing::warn!(stage = "shop", "Model suggested no candidates, using fallback list");
                fallback(brief, plan)
            }
            Err(e) => {
                tracing::warn!(stage = "shop", error = %e, "Category generation failed, using fallback list");
                fallback(brief, plan)
            }
        };
        candidates.truncate(self.config.max_candidates);
        candidates
    }

    async fn generate_candidates(
        &self,
        brief: &RoomBrief,
        plan: &[PlanItem],
    ) -> Result<Vec<Candidate>, PipelineError> {
        let language = &self.config.locale.language;
        let instruction = if plan.is_empty() {
            prompts::categories_for_room_prompt(
                &brief.room_type,
                &brief.style,
                brief.budget,
                language,
                self.config.max_candidates,
            )
        } else {
            prompts::categories_from_plan_prompt(
                plan,
                &brief.style,
                brief.budget,
                language,
                self.config.max_candidates,
            )
        };
        let request = GenerateRequest::text(instruction).with_timeout(self.config.model_timeout);
        let response = self.model.generate(request).await?;
        candidates::parse_candidates(&response.text())
    }

    /// Resolve candidates into products with bounded concurrency.
    pub async fn source_all(&self, candidates: Vec<Candidate>) -> Vec<Product> {
        let mut products: Vec<Product> = stream::iter(candidates)
            .map(|c| self.source_one(c))
            .buffered(self.config.sourcing_concurrency.max(1))
            .filter_map(|p| async move { p })
            .collect()
            .await;
        sort_by_priority(&mut products);
        products
    }

    async fn source_one(&self, candidate: Candidate) -> Option<Product> {
        let params = SourcingParams {
            filter: &self.config.image_filter,
            locale: &self.config.locale,
            results_per_query: self.config.search_results_per_query,
            timeout: self.config.search_timeout,
        };
        let hit = sourcing::source_term(self.search.as_ref(), &candidate.search_term, &params).await?;
        Some(self.build_product(candidate, hit).await)
    }

    async fn build_product(&self, candidate: Candidate, hit: SourcedHit) -> Product {
        let SourcedHit {
            result,
            image_url: source_image_url,
            query,
        } = hit;

        let persisted_image_url = match self.persister.persist_remote(&source_image_url).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(stage = "shop", url = %source_image_url, error = %e, "Image persistence failed, keeping source URL");
                None
            }
        };
        let verified = self.config.verify_product_links
            && self
                .fetcher
                .is_reachable(&result.link, self.config.search_timeout)
                .await;
        let price = price::extract_price(&result);

        let name = clean_product_title(&result.title);
        Product {
            id: new_id().to_string(),
            name: if name.is_empty() {
                candidate.search_term.clone()
            } else {
                name
            },
            category: candidate.category,
            description: result.snippet,
            visual_description: candidate.visual_description,
            search_query: query,
            image_url: persisted_image_url
                .clone()
                .unwrap_or_else(|| source_image_url.clone()),
            source_image_url,
            persisted_image_url,
            source: source_hostname(&result.link),
            product_url: result.link,
            verified,
            price: price.as_ref().map(|p| p.amount),
            currency: price.and_then(|p| p.currency),
            priority: candidate.priority,
            fetched_at: chrono::Utc::now(),
        }
    }
}

fn fallback(brief: &RoomBrief, plan: &[PlanItem]) -> Vec<Candidate> {
    if plan.is_empty() {
        candidates::fallback_for_room(&brief.room_type, &brief.style)
    } else {
        candidates::fallback_from_plan(plan, &brief.style)
    }
}
