//! Doctor command - verify configuration and the local index.

use crate::cli::Output;
use crate::config::{EmbeddingProvider, Settings, VectorStoreProvider};
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Kurs Doctor");
    println!();
    println!("Checking configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("Model Provider").bold());
    let provider_checks = vec![
        check_openai_api_key(needs_api_key(settings)),
        check_chat_endpoint(settings),
        check_embedding(settings),
    ];
    for check in &provider_checks {
        check.print();
    }
    checks.extend(provider_checks);

    println!();

    println!("{}", style("Directories").bold());
    let dir_checks = check_directories(settings);
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Kurs.",
            errors
        ));
        anyhow::bail!("{} doctor check(s) failed", errors);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Kurs is ready to use.");
    }

    Ok(())
}

/// A key is needed unless chat goes to a custom endpoint and embeddings are local.
fn needs_api_key(settings: &Settings) -> bool {
    settings.rag.api_base.is_none() || settings.embedding.provider == EmbeddingProvider::OpenAI
}

/// Check if OpenAI API key is configured.
fn check_openai_api_key(required: bool) -> CheckResult {
    let missing = |message: &str| {
        if required {
            CheckResult::error(
                "OPENAI_API_KEY",
                message,
                "Set with: export OPENAI_API_KEY='sk-...'",
            )
        } else {
            CheckResult::ok("OPENAI_API_KEY", &format!("{} (not required)", message))
        }
    };

    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Ok(key) if key.is_empty() => missing("empty"),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => missing("not set"),
    }
}

/// Check the chat model endpoint.
fn check_chat_endpoint(settings: &Settings) -> CheckResult {
    match &settings.rag.api_base {
        None => CheckResult::ok("Chat model", &format!("{} (OpenAI)", settings.rag.model)),
        Some(base) => match url::Url::parse(base) {
            Ok(url) => CheckResult::ok(
                "Chat model",
                &format!("{} at {}", settings.rag.model, url),
            ),
            Err(e) => CheckResult::error(
                "Chat model",
                &format!("invalid api_base '{}': {}", base, e),
                "Set rag.api_base to a full URL, e.g. http://localhost:11434/v1",
            ),
        },
    }
}

/// Check the embedding configuration.
fn check_embedding(settings: &Settings) -> CheckResult {
    let embedding = &settings.embedding;
    match embedding.provider {
        EmbeddingProvider::OpenAI => CheckResult::ok(
            "Embeddings",
            &format!("{} ({} dimensions)", embedding.model, embedding.dimensions),
        ),
        EmbeddingProvider::Hash => CheckResult::warning(
            "Embeddings",
            &format!("local hashing ({} dimensions)", embedding.dimensions),
            "Hashed embeddings match words, not meaning. Use provider = \"openai\" for better results",
        ),
    }
}

/// Check data directories and the index.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok(
            "Data directory",
            &format!("{}", data_dir.display()),
        ));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    let docs_dir = settings.docs_dir();
    if docs_dir.is_dir() {
        results.push(CheckResult::ok(
            "Docs directory",
            &format!("{}", docs_dir.display()),
        ));
    } else {
        results.push(CheckResult::warning(
            "Docs directory",
            &format!("{} (not found)", docs_dir.display()),
            "Pass a path to 'kurs ingest' or set general.docs_dir",
        ));
    }

    match settings.vector_store.provider {
        VectorStoreProvider::Memory => results.push(CheckResult::warning(
            "Index",
            "in-memory (not persisted)",
            "Courses must be ingested again on every run",
        )),
        VectorStoreProvider::Sqlite => {
            let db_path = settings.sqlite_path();
            if db_path.exists() {
                let size = std::fs::metadata(&db_path)
                    .map(|m| format_size(m.len()))
                    .unwrap_or_else(|_| "unknown size".to_string());
                results.push(CheckResult::ok(
                    "Index",
                    &format!("{} ({})", db_path.display(), size),
                ));
            } else {
                results.push(CheckResult::warning(
                    "Index",
                    &format!("{} (not created yet)", db_path.display()),
                    "The index will be created on first ingest",
                ));
            }
        }
    }

    results
}

/// Check if the config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: kurs config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
