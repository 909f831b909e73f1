//! Agent runner with a single bounded tool round.

use crate::config::Prompts;
use crate::error::{KursError, Result};
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::models::Source;
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Agent answering one query at a time against a tool registry.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    prompts: Arc<Prompts>,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, prompts: Arc<Prompts>) -> Self {
        Self { model, prompts }
    }

    /// Answer `query`, optionally in the context of prior conversation.
    ///
    /// Sources recorded in `registry` are drained into the response, and the
    /// registry is left without sources whether the run succeeds or fails.
    #[instrument(skip(self, history, registry), fields(model = self.model.model_name()))]
    pub async fn run(
        &self,
        query: &str,
        history: Option<&str>,
        registry: &ToolRegistry,
    ) -> Result<AgentResponse> {
        registry.reset_sources()?;

        let result = self.invoke(query, history, registry).await;
        let sources = registry.take_sources()?;

        let (answer, tool_calls, invocations) = result?;
        Ok(AgentResponse {
            answer,
            sources,
            tool_calls,
            invocations,
        })
    }

    async fn invoke(
        &self,
        query: &str,
        history: Option<&str>,
        registry: &ToolRegistry,
    ) -> Result<(String, Vec<ToolCallRecord>, usize)> {
        let mut request = ChatRequest {
            system: self.prompts.agent_system(history),
            messages: vec![ChatMessage::User(query.to_string())],
            tools: registry.definitions(),
        };

        let response = self.model.complete(&request).await?;
        if !response.wants_tools() {
            debug!("Answered directly");
            return Ok((response.content.unwrap_or_default(), Vec::new(), 1));
        }

        let mut records = Vec::with_capacity(response.tool_calls.len());
        request.messages.push(ChatMessage::Assistant {
            content: response.content.clone(),
            tool_calls: response.tool_calls.clone(),
        });

        for call in &response.tool_calls {
            info!("Agent calling tool: {} with args: {}", call.name, call.arguments);

            let result = match registry.execute(&call.name, &call.arguments).await {
                Ok(output) => output,
                Err(e @ KursError::ToolNotFound(_)) => return Err(e),
                Err(e) => {
                    warn!("Tool {} failed: {}", call.name, e);
                    format!("Tool execution error: {}", e)
                }
            };

            request.messages.push(ChatMessage::Tool {
                call_id: call.id.clone(),
                content: result.clone(),
            });
            records.push(ToolCallRecord {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                result,
            });
        }

        // Tools are not offered again, so this round always ends the query.
        request.tools.clear();
        let follow_up = self.model.complete(&request).await?;
        if follow_up.wants_tools() {
            warn!(
                "Ignoring {} tool calls requested after the tool round",
                follow_up.tool_calls.len()
            );
        }

        Ok((follow_up.content.unwrap_or_default(), records, 2))
    }
}

/// Response from an agent run.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Final answer text.
    pub answer: String,
    /// Citations collected from tool executions, in execution order.
    pub sources: Vec<Source>,
    /// Tool calls made during the run.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of model invocations (1 or 2).
    pub invocations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned to the model.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedChatModel;
    use crate::llm::ChatResponse;
    use crate::tools::{Tool, ToolDefinition, ToolName, ToolOutput};
    use async_trait::async_trait;
    use serde_json::json;

    /// Search stand-in that cites its query as the source, or fails on demand.
    struct FakeSearch;

    #[async_trait]
    impl Tool for FakeSearch {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: ToolName::SearchCourseContent,
                description: "search".to_string(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput> {
            let query = arguments["query"].as_str().unwrap_or_default();
            if query == "explode" {
                return Err(KursError::VectorStore("disk on fire".to_string()));
            }
            Ok(ToolOutput {
                content: "[Intro to MCP - Lesson 1]\nMCP stands for Model Context Protocol.".to_string(),
                sources: vec![Source::new(query, None)],
            })
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new().with_tool(Arc::new(FakeSearch))
    }

    fn agent(model: &Arc<ScriptedChatModel>) -> Agent {
        Agent::new(model.clone(), Arc::new(Prompts::default()))
    }

    fn search_call(query: &str) -> ChatResponse {
        ChatResponse::tool_call("call_1", "search_course_content", json!({"query": query}))
    }

    #[tokio::test]
    async fn test_direct_response_uses_one_invocation() {
        let model = Arc::new(ScriptedChatModel::new(vec![ChatResponse::text("Paris.")]));
        let response = agent(&model)
            .run("What is the capital of France?", None, &registry())
            .await
            .unwrap();

        assert_eq!(response.answer, "Paris.");
        assert!(response.sources.is_empty());
        assert_eq!(response.invocations, 1);
        assert_eq!(model.calls(), 1);
        assert_eq!(model.requests()[0].tools.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_is_bounded_to_two_invocations() {
        // The second response asks for more tools; it must be ignored.
        let model = Arc::new(ScriptedChatModel::new(vec![
            search_call("mcp"),
            ChatResponse {
                content: Some("MCP means Model Context Protocol.".to_string()),
                ..search_call("again")
            },
            ChatResponse::text("never used"),
        ]));
        let registry = registry();
        let response = agent(&model).run("What is MCP?", None, &registry).await.unwrap();

        assert_eq!(response.answer, "MCP means Model Context Protocol.");
        assert_eq!(response.invocations, 2);
        assert_eq!(model.calls(), 2);

        let requests = model.requests();
        assert!(requests[1].tools.is_empty());
        assert_eq!(requests[1].messages.len(), 3);
        assert!(matches!(
            &requests[1].messages[2],
            ChatMessage::Tool { call_id, content } if call_id == "call_1" && content.contains("Model Context Protocol")
        ));

        assert_eq!(response.sources, vec![Source::new("mcp", None)]);
        assert_eq!(response.tool_calls.len(), 1);
        assert!(registry.last_sources().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back_to_model() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            search_call("explode"),
            ChatResponse::text("Sorry, something went wrong."),
        ]));
        let response = agent(&model).run("q", None, &registry()).await.unwrap();

        assert_eq!(response.answer, "Sorry, something went wrong.");
        assert!(response.sources.is_empty());
        assert!(response.tool_calls[0]
            .result
            .starts_with("Tool execution error: Vector store error: disk on fire"));
    }

    #[tokio::test]
    async fn test_every_requested_tool_call_runs_in_order() {
        let call = |id: &str, query: &str| crate::llm::ToolCallRequest {
            id: id.to_string(),
            name: "search_course_content".to_string(),
            arguments: json!({ "query": query }).to_string(),
        };
        let model = Arc::new(ScriptedChatModel::new(vec![
            ChatResponse {
                content: None,
                tool_calls: vec![call("c1", "one"), call("c2", "explode"), call("c3", "two")],
            },
            ChatResponse::text("Combined answer."),
        ]));
        let response = agent(&model).run("q", None, &registry()).await.unwrap();

        assert_eq!(response.answer, "Combined answer.");
        assert_eq!(response.invocations, 2);
        assert_eq!(
            response.sources,
            vec![Source::new("one", None), Source::new("two", None)]
        );
        assert_eq!(response.tool_calls.len(), 3);
        assert!(response.tool_calls[1].result.starts_with("Tool execution error:"));

        // user, assistant with calls, then one tool reply per call
        let messages = &model.requests()[1].messages;
        assert_eq!(messages.len(), 5);
        let reply_ids: Vec<&str> = messages[2..]
            .iter()
            .map(|m| match m {
                ChatMessage::Tool { call_id, .. } => call_id.as_str(),
                other => panic!("expected a tool reply, got {:?}", other),
            })
            .collect();
        assert_eq!(reply_ids, vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_fed_back() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            ChatResponse {
                content: None,
                tool_calls: vec![crate::llm::ToolCallRequest {
                    id: "c".to_string(),
                    name: "search_course_content".to_string(),
                    arguments: "{broken".to_string(),
                }],
            },
            ChatResponse::text("ok"),
        ]));
        let response = agent(&model).run("q", None, &registry()).await.unwrap();
        assert!(response.tool_calls[0].result.contains("Invalid tool arguments"));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error() {
        let model = Arc::new(ScriptedChatModel::new(vec![ChatResponse::tool_call(
            "c",
            "drop_tables",
            json!({}),
        )]));
        let err = agent(&model).run("q", None, &registry()).await.unwrap_err();
        assert!(matches!(err, KursError::ToolNotFound(name) if name == "drop_tables"));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_is_fatal_and_clears_sources() {
        let model = Arc::new(ScriptedChatModel::new(vec![search_call("mcp")]).then_fail("rate limited"));
        let registry = registry();
        let err = agent(&model).run("q", None, &registry).await.unwrap_err();

        assert!(matches!(err, KursError::ModelInvocation(_)));
        assert!(registry.last_sources().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sources_do_not_leak_into_next_query() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            search_call("mcp"),
            ChatResponse::text("answer one"),
            ChatResponse::text("answer two"),
        ]));
        let agent = agent(&model);
        let registry = registry();

        let first = agent.run("q1", None, &registry).await.unwrap();
        assert_eq!(first.sources.len(), 1);

        let second = agent.run("q2", None, &registry).await.unwrap();
        assert!(second.sources.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_part_of_system_prompt() {
        let model = Arc::new(ScriptedChatModel::new(vec![ChatResponse::text("ok")]));
        agent(&model)
            .run("and lesson 2?", Some("User: what is lesson 1?\nAssistant: basics"), &registry())
            .await
            .unwrap();

        let system = &model.requests()[0].system;
        assert!(system.contains("Previous conversation:\nUser: what is lesson 1?"));
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "search_course_content".to_string(),
            arguments: r#"{"query": "test"}"#.to_string(),
            result: "Found results".to_string(),
        };
        assert_eq!(format!("{}", record), r#"search_course_content({"query": "test"})"#);
    }
}
