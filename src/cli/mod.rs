//! CLI module for Kurs.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Kurs - Ask questions about your course materials
///
/// Indexes course documents into a local vector store and answers questions
/// with a tool-calling language model that cites the lessons it used.
#[derive(Parser, Debug)]
#[command(name = "kurs")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "KURS_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check configuration and API access
    Doctor,

    /// Index a course document or a folder of course documents
    Ingest {
        /// File or folder to ingest (defaults to the configured docs folder)
        path: Option<String>,

        /// Remove all indexed courses before ingesting a folder
        #[arg(long)]
        clear: bool,

        /// Re-index a single document even if its course is already indexed
        #[arg(short, long)]
        force: bool,
    },

    /// Ask a single question about your courses
    Ask {
        /// The question to ask
        question: String,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start an interactive chat session
    Chat {
        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Search course content directly, without the language model
    Search {
        /// Search query
        query: String,

        /// Restrict to a course (partial names work)
        #[arg(long)]
        course: Option<String>,

        /// Restrict to a lesson number
        #[arg(short = 'n', long)]
        lesson: Option<u32>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List indexed courses
    Courses,

    /// Show the outline of a course
    Outline {
        /// Course name (partial names work)
        course: String,
    },

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_filters() {
        let cli = Cli::try_parse_from([
            "kurs", "search", "what is mcp", "--course", "MCP", "-n", "1", "-l", "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Search {
                query,
                course,
                lesson,
                limit,
            } => {
                assert_eq!(query, "what is mcp");
                assert_eq!(course.as_deref(), Some("MCP"));
                assert_eq!(lesson, Some(1));
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
