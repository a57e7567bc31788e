//! The LLM widget: the engine's one required external collaborator for
//! everything that needs a model call (language detection, industry
//! refinement, RAG lookup, term extraction, segment translation) plus the
//! host-resolved cancellation handshake.
//!
//! Modeled as `async_trait` objects rather than a concrete client so the
//! engine never depends on any particular LLM provider.

use async_trait::async_trait;
use serde_json::Value;

/// A request to the LLM widget. `output` carries a JSON-schema-shaped
/// description of the desired structured response; when `None`, the
/// widget is expected to return free-form prose in `result`.
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub prompt: String,
    pub context: Option<String>,
    pub output: Option<Value>,
    pub max_tokens: Option<u32>,
    pub search_knowledge_base: bool,
    pub search_query: Option<String>,
    pub search_source: Option<String>,
    pub search_limit: Option<u32>,
}

impl AskRequest {
    pub fn prose(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: None,
            output: None,
            max_tokens: None,
            search_knowledge_base: false,
            search_query: None,
            search_source: None,
            search_limit: None,
        }
    }

    pub fn structured(prompt: impl Into<String>, output_schema: Value) -> Self {
        Self {
            output: Some(output_schema),
            ..Self::prose(prompt)
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_knowledge_base_search(
        mut self,
        query: impl Into<String>,
        source: Option<String>,
        limit: u32,
    ) -> Self {
        self.search_knowledge_base = true;
        self.search_query = Some(query.into());
        self.search_source = source;
        self.search_limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AskResponse {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub sources: Option<Vec<Value>>,
}

impl AskResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            sources: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            sources: None,
        }
    }

    pub fn result_as_str(&self) -> Option<&str> {
        self.result.as_ref().and_then(Value::as_str)
    }
}

/// The required external collaborator. Hosts implement this over their own
/// LLM client; the engine never constructs one itself.
#[async_trait]
pub trait LlmWidget: Send + Sync {
    async fn ask(&self, request: AskRequest) -> AskResponse;

    /// When `false`, the engine uses the prose-fallback translator (§4.8)
    /// and skips RAG structured output, standing in for the optional
    /// `helpers` namespace of the original JS interface.
    fn supports_structured_output(&self) -> bool {
        true
    }
}

/// The user's resolution of a cancellation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelChoice {
    Keep,
    Restore,
}

/// Host-resolved cancel handshake: `cancel()` awaits this to learn whether
/// the user wants to keep the partial translation or restore the original.
#[async_trait]
pub trait CancelRequestHandler: Send + Sync {
    async fn request(&self) -> CancelChoice;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A scripted `LlmWidget` double: each call to `ask` consumes the next
    /// queued response. Panics if the queue is exhausted, which surfaces
    /// test setup bugs (an unexpected extra call) loudly rather than
    /// silently returning a default.
    pub struct FakeLlmWidget {
        responses: Mutex<std::collections::VecDeque<AskResponse>>,
        structured: bool,
    }

    impl FakeLlmWidget {
        pub fn new(responses: Vec<AskResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                structured: true,
            }
        }

        pub fn without_structured_output(mut self) -> Self {
            self.structured = false;
            self
        }
    }

    #[async_trait]
    impl LlmWidget for FakeLlmWidget {
        async fn ask(&self, _request: AskRequest) -> AskResponse {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("FakeLlmWidget: no more scripted responses")
        }

        fn supports_structured_output(&self) -> bool {
            self.structured
        }
    }
}
