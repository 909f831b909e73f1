//! OpenAI chat completions backend.

use super::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ToolCallRequest};
use crate::error::{KursError, Result};
use crate::openai::{create_client_with_timeout, OpenAIClient};
use crate::tools::ToolDefinition;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Chat model backed by the OpenAI API (or a compatible endpoint).
pub struct OpenAIChatModel {
    client: OpenAIClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

fn build_error(e: impl std::fmt::Display) -> KursError {
    KursError::ModelInvocation(format!("Failed to build request: {}", e))
}

impl OpenAIChatModel {
    pub fn new(model: &str, timeout: Duration, api_base: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout, api_base)?,
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: 800,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn tool(definition: &ToolDefinition) -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: definition.name.as_str().to_string(),
                description: Some(definition.description.clone()),
                parameters: Some(definition.parameters.clone()),
                strict: None,
            },
        }
    }

    fn message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
        let message = match message {
            ChatMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(build_error)?
                .into(),
            ChatMessage::Assistant { content, tool_calls } => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(content) = content {
                    args.content(content.clone());
                }
                if !tool_calls.is_empty() {
                    args.tool_calls(
                        tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.clone(),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                args.build().map_err(build_error)?.into()
            }
            ChatMessage::Tool { call_id, content } => ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(call_id.clone())
                .content(content.clone())
                .build()
                .map_err(build_error)?
                .into(),
        };
        Ok(message)
    }

    #[allow(deprecated)]
    fn build_request(&self, request: &ChatRequest) -> Result<CreateChatCompletionRequest> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(build_error)?
                .into(),
        ];
        for message in &request.messages {
            messages.push(Self::message(message)?);
        }

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);

        if !request.tools.is_empty() {
            args.tools(request.tools.iter().map(Self::tool).collect::<Vec<_>>())
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        args.build().map_err(build_error)
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip_all, fields(model = %self.model, tools = request.tools.len()))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let api_request = self.build_request(request)?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| KursError::ModelInvocation(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| KursError::ModelInvocation("No response from model".to_string()))?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        debug!("Model returned {} tool calls", tool_calls.len());

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolName;

    fn model() -> OpenAIChatModel {
        OpenAIChatModel::new("gpt-4o-mini", Duration::from_secs(5), None).unwrap()
    }

    fn search_definition() -> ToolDefinition {
        ToolDefinition {
            name: ToolName::SearchCourseContent,
            description: "search".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn test_request_offers_tools_when_present() {
        let request = ChatRequest {
            system: "system".to_string(),
            messages: vec![ChatMessage::User("hi".to_string())],
            tools: vec![search_definition()],
        };
        let built = model().build_request(&request).unwrap();

        assert_eq!(built.messages.len(), 2);
        let tools = built.tools.unwrap();
        assert_eq!(tools[0].function.name, "search_course_content");
        assert!(matches!(built.tool_choice, Some(ChatCompletionToolChoiceOption::Auto)));
    }

    #[test]
    fn test_request_without_tools_and_with_tool_history() {
        let request = ChatRequest {
            system: "system".to_string(),
            messages: vec![
                ChatMessage::User("hi".to_string()),
                ChatMessage::Assistant {
                    content: None,
                    tool_calls: vec![ToolCallRequest {
                        id: "call_1".to_string(),
                        name: "search_course_content".to_string(),
                        arguments: r#"{"query":"x"}"#.to_string(),
                    }],
                },
                ChatMessage::Tool {
                    call_id: "call_1".to_string(),
                    content: "result".to_string(),
                },
            ],
            tools: Vec::new(),
        };
        let built = model().build_request(&request).unwrap();

        assert_eq!(built.messages.len(), 4);
        assert!(built.tools.is_none());
        assert!(built.tool_choice.is_none());
        assert!(matches!(
            built.messages[3],
            ChatCompletionRequestMessage::Tool(_)
        ));
    }
}
