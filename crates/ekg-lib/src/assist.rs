//! Contracts for the text and vision model backends that produce free-text
//! commentary, plus prompt construction for EKG summaries.
//!
//! Backends are supplied by the host. Their failures never propagate: the
//! entry points here turn them into a displayable message.

use anyhow::{bail, Result};
use log::{info, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::config::PromptConfig;
use crate::metrics::SignalSummary;

const DEFAULT_TEMPLATE: &str = "Here is EKG data from an Apple Watch as a microvolt time series.\n\
Summary: {summary}\n\
Signal (first {preview} values): {signal}\n\
Please analyse the signal medically and point out possible abnormalities.";

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text-completion backend (cloud API or local inference server).
pub trait TextCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Fill the configured template (or the built-in one) for a recording.
///
/// Placeholders: `{summary}`, `{signal}`, `{preview}`, `{count}`, `{rate}`.
pub fn build_prompt(
    samples: &[f64],
    summary: &SignalSummary,
    sampling_rate: Option<f64>,
    config: &PromptConfig,
) -> String {
    let preview: Vec<String> = samples
        .iter()
        .take(config.preview_samples)
        .map(|v| format!("{:.2}", v))
        .collect();
    let summary_line = format!(
        "Max: {:.2}, Min: {:.2}, Mean: {:.2}",
        summary.max, summary.min, summary.mean
    );
    let rate = sampling_rate
        .map(|fs| format!("{} Hz", fs))
        .unwrap_or_else(|| "unknown rate".into());
    config
        .template
        .as_deref()
        .unwrap_or(DEFAULT_TEMPLATE)
        .replace("{summary}", &summary_line)
        .replace("{signal}", &preview.join(", "))
        .replace("{preview}", &preview.len().to_string())
        .replace("{count}", &summary.sample_count.to_string())
        .replace("{rate}", &rate)
}

pub fn completion_request(
    samples: &[f64],
    summary: &SignalSummary,
    sampling_rate: Option<f64>,
    config: &PromptConfig,
) -> CompletionRequest {
    CompletionRequest {
        model: config.model.clone(),
        prompt: build_prompt(samples, summary, sampling_rate, config),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Ask the backend for commentary; errors come back as text.
pub fn analyze_with_llm(backend: &dyn TextCompletion, request: &CompletionRequest) -> String {
    match backend.complete(request) {
        Ok(text) => text,
        Err(err) => {
            warn!("completion with model {} failed: {:#}", request.model, err);
            format!("LLM analysis failed: {:#}", err)
        }
    }
}

/// A loaded image-captioning model.
pub trait CaptionModel {
    fn caption(&self, image: &[u8], prompt: Option<&str>) -> Result<String>;
}

/// Creates caption models by identifier, e.g. from local weights.
pub trait CaptionModelLoader {
    type Model: CaptionModel;

    fn load(&self, model: &str) -> Result<Self::Model>;
}

/// Loaded models keyed by identifier. Entries live as long as the cache.
#[derive(Debug)]
pub struct ModelCache<M> {
    models: HashMap<String, M>,
}

impl<M> Default for ModelCache<M> {
    fn default() -> Self {
        Self {
            models: HashMap::new(),
        }
    }
}

impl<M> ModelCache<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Return the cached model, running `load` only on the first request for `name`.
    /// A failed load leaves nothing cached.
    pub fn get_or_try_load<F>(&mut self, name: &str, load: F) -> Result<&M>
    where
        F: FnOnce() -> Result<M>,
    {
        match self.models.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                info!("loading model {}", name);
                let model = load()?;
                Ok(entry.insert(model))
            }
        }
    }
}

/// Image description service owning its loader and model cache.
pub struct VisionService<L: CaptionModelLoader> {
    loader: L,
    cache: ModelCache<L::Model>,
}

impl<L: CaptionModelLoader> VisionService<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: ModelCache::new(),
        }
    }

    pub fn cache(&self) -> &ModelCache<L::Model> {
        &self.cache
    }

    pub fn try_describe(&mut self, image: &[u8], model: &str, prompt: Option<&str>) -> Result<String> {
        if image.is_empty() {
            bail!("image is empty");
        }
        let loader = &self.loader;
        let instance = self.cache.get_or_try_load(model, || loader.load(model))?;
        instance.caption(image, prompt)
    }

    /// Like [`VisionService::try_describe`], with failures rendered as text.
    pub fn describe(&mut self, image: &[u8], model: &str, prompt: Option<&str>) -> String {
        match self.try_describe(image, model, prompt) {
            Ok(text) => text,
            Err(err) => {
                warn!("image analysis with model {} failed: {:#}", model, err);
                format!("Image analysis failed: {:#}", err)
            }
        }
    }
}
