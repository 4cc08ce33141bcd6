pub mod providers;
pub mod retry;

use tracing::info;

use pageflow_core::config::RefinementConfig;
use pageflow_core::traits::{Capability, Refiner};

pub use providers::OpenAiRefiner;
pub use retry::RetryingRefiner;

/// Decide once whether answer refinement is usable and build the refiner.
///
/// Every provider speaks the OpenAI-compatible chat completions API; named
/// presets only pick the default endpoint and whether a key is required.
pub fn create_refiner(config: Option<&RefinementConfig>) -> Capability<Box<dyn Refiner>> {
    let Some(config) = config else {
        return Capability::unavailable("no [refinement] section and OPENAI_API_KEY unset");
    };
    if !config.enabled {
        return Capability::unavailable("refinement disabled in config");
    }

    let preset = providers::presets::get_preset(&config.provider);
    if preset.is_none() && config.base_url.is_none() {
        return Capability::unavailable(format!(
            "unknown provider '{}' and no base_url",
            config.provider
        ));
    }
    let needs_key = preset.map_or(true, |p| p.needs_api_key);
    if needs_key && config.usable_api_key().is_none() {
        return Capability::unavailable(format!("no API key for provider '{}'", config.provider));
    }

    match OpenAiRefiner::new(config) {
        Ok(client) => {
            info!(provider = %config.provider, model = %config.model_id, "Answer refinement enabled");
            let refiner = RetryingRefiner::new(Box::new(client), config.retry.clone());
            Capability::Available(Box::new(refiner) as Box<dyn Refiner>)
        }
        Err(e) => Capability::unavailable(e.to_string()),
    }
}
