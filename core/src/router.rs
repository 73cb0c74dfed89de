// Conversation Router implementation
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::llm::model::{ModelFactory, ModelMessage, ModelRequest};
use crate::llm::provider::{Provider, ProviderCatalog, ProviderHandle};
use crate::llm::selector::{ProviderSelector, GEMINI_FLASH_LITE};
use crate::llm::tool_loop::{ToolLoop, DEFAULT_MAX_STEPS};
use crate::message::ChatRequest;
use crate::prompts::PromptTemplates;
use crate::stream::{UiEvent, UiStream};
use crate::tools::ToolRegistry;

pub const PERPLEXITY_SEARCH_MODEL: &str = "sonar";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Search-capable strategy drawn for web-search requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Gemini with Google's built-in search and URL tools
    Google,
    /// Perplexity's search-native model
    Perplexity,
}

/// Injectable randomness so tests can force a branch
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..len`; `len` is never zero
    fn pick_index(&self, len: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Reproducible sequence
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..len)
    }
}

/// Weighted pool: each entry is one ticket, so repeats raise a strategy's odds
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPool {
    entries: Vec<SearchStrategy>,
}

impl SearchPool {
    /// An empty pool falls back to the default `[google, perplexity]`
    pub fn new(entries: Vec<SearchStrategy>) -> Self {
        if entries.is_empty() {
            return Self::default();
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[SearchStrategy] {
        &self.entries
    }

    pub fn pick(&self, rng: &dyn RandomSource) -> SearchStrategy {
        let idx = rng.pick_index(self.entries.len()).min(self.entries.len() - 1);
        self.entries[idx]
    }
}

impl Default for SearchPool {
    fn default() -> Self {
        Self {
            entries: vec![SearchStrategy::Google, SearchStrategy::Perplexity],
        }
    }
}

/// How a request will be answered
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Search-augmented streaming with provider-side search tools
    GroundedSearch(ProviderHandle),
    /// Provider-native streaming, no tools attached
    NativeSearch(ProviderHandle),
    /// Multi-step streaming with `webSearch` and `convertCurrency` attached
    Agentic(ProviderHandle),
}

impl Strategy {
    pub fn handle(&self) -> &ProviderHandle {
        match self {
            Strategy::GroundedSearch(h) | Strategy::NativeSearch(h) | Strategy::Agentic(h) => h,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::GroundedSearch(_) => "grounded-search",
            Strategy::NativeSearch(_) => "native-search",
            Strategy::Agentic(_) => "agentic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Routing decision for one request
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    pub system_prompt: String,
    pub strategy: Strategy,
}

/// Failure before the stream starts; becomes a status + `{error}` body
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{status}: {message}")]
pub struct ChatFailure {
    pub status: u16,
    pub message: String,
}

impl ChatFailure {
    pub fn internal() -> Self {
        Self {
            status: 500,
            message: "Internal Server Error".to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }
}

/// Picks a strategy per request and produces its UI event stream
#[derive(Clone)]
pub struct ConversationRouter {
    selector: ProviderSelector,
    prompts: Arc<PromptTemplates>,
    pool: SearchPool,
    factory: Arc<dyn ModelFactory>,
    tools: ToolRegistry,
    rng: Arc<dyn RandomSource>,
    max_steps: usize,
    request_timeout: Duration,
}

impl ConversationRouter {
    pub fn new(
        catalog: Arc<ProviderCatalog>,
        prompts: Arc<PromptTemplates>,
        factory: Arc<dyn ModelFactory>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            selector: ProviderSelector::new(catalog),
            prompts,
            pool: SearchPool::default(),
            factory,
            tools,
            rng: Arc::new(ThreadRandom),
            max_steps: DEFAULT_MAX_STEPS,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        factory: Arc<dyn ModelFactory>,
        tools: ToolRegistry,
    ) -> Self {
        Self::new(
            Arc::new(config.providers.clone()),
            Arc::new(config.prompts.clone()),
            factory,
            tools,
        )
        .with_search_pool(SearchPool::new(config.chat.search_pool.clone()))
        .with_max_steps(config.chat.max_steps)
        .with_request_timeout(Duration::from_millis(config.chat.request_timeout_ms))
    }

    pub fn with_search_pool(mut self, pool: SearchPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_random_source(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_selector(mut self, selector: ProviderSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    /// Decide prompt and strategy. Pure apart from the random draw.
    pub fn plan(&self, request: &ChatRequest) -> RoutePlan {
        let system_prompt = self
            .prompts
            .resolve(request.system_prompt.as_deref())
            .to_string();

        let strategy = if request.web_search {
            let catalog = self.selector.catalog();
            match self.pool.pick(self.rng.as_ref()) {
                SearchStrategy::Google => {
                    Strategy::GroundedSearch(catalog.grounded_handle(GEMINI_FLASH_LITE))
                }
                SearchStrategy::Perplexity => Strategy::NativeSearch(
                    catalog.handle(Provider::Perplexity, PERPLEXITY_SEARCH_MODEL),
                ),
            }
        } else {
            Strategy::Agentic(self.selector.select(&request.model, request.has_attachment))
        };

        debug!(target: "router", strategy = %strategy, provider = %strategy.handle().provider, model = %strategy.handle().model, "Route planned");
        RoutePlan {
            system_prompt,
            strategy,
        }
    }

    /// Plan, build the model and start streaming. Setup failures come back as
    /// `ChatFailure`; anything after that ends the stream with an error event.
    pub fn route(&self, request: ChatRequest) -> Result<UiStream, ChatFailure> {
        let deadline = tokio::time::Instant::now() + self.request_timeout;
        let plan = self.plan(&request);
        let handle = plan.strategy.handle();

        let model = self.factory.build(handle).map_err(|e| {
            error!(target: "router", provider = %handle.provider, model = %handle.model, error = %e, "Failed to build model");
            ChatFailure::internal()
        })?;

        let messages: Vec<ModelMessage> = request
            .messages
            .iter()
            .filter_map(ModelMessage::from_ui)
            .collect();
        info!(target: "router", strategy = %plan.strategy, provider = %handle.provider, model = %handle.model, messages = messages.len(), "Routing chat request");

        let model_request = ModelRequest {
            system: plan.system_prompt,
            messages,
            tools: Vec::new(),
        };
        let tool_loop = ToolLoop::new(model).with_max_steps(self.max_steps);
        let stream = match plan.strategy {
            Strategy::Agentic(_) => tool_loop.with_tools(self.tools.clone()).run(model_request),
            Strategy::GroundedSearch(_) | Strategy::NativeSearch(_) => tool_loop.run(model_request),
        };

        Ok(bounded(stream, deadline, self.request_timeout))
    }
}

/// End the stream with a timeout error once `deadline` passes
fn bounded(stream: UiStream, deadline: tokio::time::Instant, budget: Duration) -> UiStream {
    Box::pin(async_stream::stream! {
        let mut stream = stream;
        loop {
            match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(event)) => {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(target: "router", budget_ms = budget.as_millis() as u64, "Chat request exceeded its budget");
                    yield UiEvent::error(format!("request timed out after {} ms", budget.as_millis()));
                    break;
                }
            }
        }
    })
}
