//! Prompt templates for Kurs.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the course assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    /// System prompt. `{{conversation_context}}` is replaced with the
    /// rendered session history (or nothing).
    pub system: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI assistant specialized in course materials and educational content, with access to tools for course information.

Available tools:
1. search_course_content: for questions about specific course content, lessons, or detailed educational material
2. get_course_outline: for questions about a course outline, lesson list, or what a course covers

Tool usage:
- General knowledge questions: answer from existing knowledge without using tools
- Course-specific questions: use the appropriate tool, then answer from its results
- If a tool reports that no course or content was found, say so plainly
- You get one round of tool calls per question; request everything you need at once

For outline answers, include the course title, instructor, course link, and every lesson with its number and title.

Response protocol:
- Provide direct answers only, with no reasoning process or search explanations
- Never mention tools, searches, or "based on the search results"

All responses must be brief, educational, clear, and supported by examples when they help understanding.
{{conversation_context}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Build the agent system prompt, embedding prior conversation if any.
    pub fn agent_system(&self, history: Option<&str>) -> String {
        let conversation_context = match history {
            Some(h) if !h.trim().is_empty() => format!("\nPrevious conversation:\n{}", h),
            _ => String::new(),
        };

        let mut vars = HashMap::new();
        vars.insert("conversation_context".to_string(), conversation_context);
        self.render_with_custom(&self.agent.system, &vars)
            .trim_end()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.agent.system.contains("search_course_content"));
        assert!(prompts.agent.system.contains("{{conversation_context}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_agent_system_with_history() {
        let prompts = Prompts::default();
        let system = prompts.agent_system(Some("User: hi\nAssistant: hello"));
        assert!(system.contains("Previous conversation:\nUser: hi\nAssistant: hello"));
        assert!(!system.contains("{{conversation_context}}"));
    }

    #[test]
    fn test_agent_system_without_history() {
        let prompts = Prompts::default();
        let system = prompts.agent_system(None);
        assert!(!system.contains("Previous conversation"));
        assert!(!system.contains("{{"));
    }

    #[test]
    fn test_custom_variables_render() {
        let mut prompts = Prompts::default();
        prompts.agent.system = "Teach {{audience}}.{{conversation_context}}".to_string();
        prompts
            .variables
            .insert("audience".to_string(), "beginners".to_string());

        assert_eq!(prompts.agent_system(None), "Teach beginners.");
    }

    #[test]
    fn test_load_custom_agent_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("agent.toml"),
            "system = \"Custom prompt{{conversation_context}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.agent_system(None), "Custom prompt");
    }
}
