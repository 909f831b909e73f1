//! Tool-calling agent for course questions.
//!
//! Runs the two-phase protocol: one model invocation with tools offered, and
//! at most one follow-up invocation (tools withheld) after executing the
//! requested tool calls.

mod runner;

pub use runner::{Agent, AgentResponse, ToolCallRecord};
