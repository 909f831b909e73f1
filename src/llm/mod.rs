//! Chat model abstraction used by the agent.
//!
//! Requests and responses are provider-neutral so the two-phase protocol can
//! be driven by any backend (and by a scripted model in tests).

mod openai;

pub use openai::OpenAIChatModel;

use crate::error::Result;
use crate::tools::ToolDefinition;
use async_trait::async_trait;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments, exactly as produced by the model.
    pub arguments: String,
}

/// One message of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

/// A single model invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Tools offered for this invocation. Empty means no tools.
    pub tools: Vec<ToolDefinition>,
}

/// The model's reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one invocation. Transport, auth and rate-limit failures surface as
    /// [`KursError::ModelInvocation`](crate::error::KursError::ModelInvocation).
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;

    fn model_name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::KursError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Chat model that replays canned responses and records every request.
    #[derive(Default)]
    pub struct ScriptedChatModel {
        responses: Mutex<VecDeque<Result<ChatResponse>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedChatModel {
        pub fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(Ok).collect()),
                requests: Mutex::default(),
            }
        }

        /// Queue a failure after the scripted responses.
        pub fn then_fail(self, message: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(KursError::ModelInvocation(message.to_string())));
            self
        }

        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChatModel {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(KursError::ModelInvocation("script exhausted".to_string())))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
