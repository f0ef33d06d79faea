use std::str::FromStr;
use std::time::Duration;

use roomcraft_core::catalog::ImageFilter;
use roomcraft_search::Locale;

/// Tunables for the stages and the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Planning, category and assistant calls.
    pub model_timeout: Duration,
    /// The image-producing render call.
    pub render_timeout: Duration,
    pub original_image_timeout: Duration,
    pub product_image_timeout: Duration,
    pub search_timeout: Duration,
    /// Product images attached to a render request.
    pub max_reference_images: usize,
    pub search_results_per_query: u8,
    pub max_candidates: usize,
    /// Candidates sourced concurrently.
    pub sourcing_concurrency: usize,
    /// Check product page reachability before accepting a product.
    pub verify_product_links: bool,
    pub image_filter: ImageFilter,
    pub locale: Locale,
    /// Backoff between attempts of the run's final store writes
    /// (`complete` or `fail`); one attempt more than delays listed.
    pub store_retry_delays: Vec<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(120),
            original_image_timeout: Duration::from_secs(30),
            product_image_timeout: Duration::from_secs(10),
            search_timeout: Duration::from_secs(15),
            max_reference_images: 5,
            search_results_per_query: 5,
            max_candidates: 6,
            sourcing_concurrency: 4,
            verify_product_links: true,
            image_filter: ImageFilter::default(),
            locale: Locale::default(),
            store_retry_delays: [1, 2, 4].map(Duration::from_secs).to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `MODEL_TIMEOUT_SECS`          | `30`                    |
    /// | `RENDER_TIMEOUT_SECS`         | `120`                   |
    /// | `ORIGINAL_IMAGE_TIMEOUT_SECS` | `30`                    |
    /// | `PRODUCT_IMAGE_TIMEOUT_SECS`  | `10`                    |
    /// | `SEARCH_TIMEOUT_SECS`         | `15`                    |
    /// | `MAX_REFERENCE_IMAGES`        | `5`                     |
    /// | `SEARCH_RESULTS_PER_QUERY`    | `5` (clamped to 1..=10) |
    /// | `MAX_CANDIDATES`              | `6`                     |
    /// | `SOURCING_CONCURRENCY`        | `4`                     |
    /// | `VERIFY_PRODUCT_LINKS`        | `true`                  |
    /// | `IMAGE_BLOCKLIST`             | built-in list           |
    /// | `SEARCH_LANGUAGE`             | `fr`                    |
    /// | `SEARCH_COUNTRY`              | `fr`                    |
    ///
    /// Unparseable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            Duration::from_secs(env_parse(name, default.as_secs()))
        };

        let image_filter = match std::env::var("IMAGE_BLOCKLIST") {
            Ok(csv) if !csv.trim().is_empty() => ImageFilter::from_csv(&csv),
            _ => defaults.image_filter.clone(),
        };
        let locale = Locale {
            language: env_string("SEARCH_LANGUAGE", &defaults.locale.language),
            country: env_string("SEARCH_COUNTRY", &defaults.locale.country),
        };

        Self {
            model_timeout: secs("MODEL_TIMEOUT_SECS", defaults.model_timeout),
            render_timeout: secs("RENDER_TIMEOUT_SECS", defaults.render_timeout),
            original_image_timeout: secs(
                "ORIGINAL_IMAGE_TIMEOUT_SECS",
                defaults.original_image_timeout,
            ),
            product_image_timeout: secs(
                "PRODUCT_IMAGE_TIMEOUT_SECS",
                defaults.product_image_timeout,
            ),
            search_timeout: secs("SEARCH_TIMEOUT_SECS", defaults.search_timeout),
            max_reference_images: env_parse("MAX_REFERENCE_IMAGES", defaults.max_reference_images),
            search_results_per_query: env_parse::<u8>(
                "SEARCH_RESULTS_PER_QUERY",
                defaults.search_results_per_query,
            )
            .clamp(1, 10),
            max_candidates: env_parse("MAX_CANDIDATES", defaults.max_candidates).max(1),
            sourcing_concurrency: env_parse("SOURCING_CONCURRENCY", defaults.sourcing_concurrency)
                .max(1),
            verify_product_links: env_parse("VERIFY_PRODUCT_LINKS", defaults.verify_product_links),
            image_filter,
            locale,
            store_retry_delays: defaults.store_retry_delays,
        }
    }
}

/// Parse `name` from the environment, falling back to `default` when the
/// variable is unset or invalid.
pub fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Non-empty string from the environment or `default`.
pub fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
