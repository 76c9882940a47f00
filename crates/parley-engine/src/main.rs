// Suggestion engine entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr; stdout carries the result)
// 2. Seed config/parley.toml if absent, then load config
// 3. Open database
// 4. Build the reasoning provider (a configuration fault is logged once and
//    the provider runs disabled)
// 5. Analyze the requested conversation and print the result as JSON

use std::sync::Arc;

use anyhow::{anyhow, Context};
use parley_core::config;
use parley_core::db::Database;
use parley_core::model::ConversationId;
use parley_engine::analyzer::ConversationAnalyzer;
use parley_engine::gate::DisplayGate;
use parley_engine::prompt;
use parley_llm::client::{ClaudeClient, LlmClient};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;

    let conversation_id = parse_conversation_id(std::env::args().nth(1))?;

    // 2. Load config
    let base_dir = std::env::current_dir().context("failed to resolve working directory")?;
    if let Some(seeded) = config::seed_engine_config(&base_dir)? {
        info!("Seeded {} from defaults", seeded.display());
    }
    let config = config::load_config_from(&base_dir).context("failed to load configuration")?;
    info!(
        "Config loaded: model={}, case_limit={}, display threshold={}",
        config.llm.model, config.engine.case_limit, config.engine.display_min_confidence
    );

    // 3. Open database
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let db_path = config.db_path.to_string_lossy().into_owned();
    let db = Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {}", db_path);

    // 4. Build the reasoning provider
    let llm_client = match ClaudeClient::from_config(&config) {
        Ok(client) => {
            info!("LLM client initialized (API key configured)");
            LlmClient::Active(client.with_system_prompt(prompt::system_prompt()))
        }
        Err(fault) => {
            error!("LLM client disabled: {}; every analysis will use the fallback", fault);
            LlmClient::Disabled
        }
    };

    // 5. Analyze
    let analyzer = ConversationAnalyzer::new(Arc::new(db), Arc::new(llm_client), &config.engine);
    let result = analyzer.analyze_conversation(conversation_id).await;

    let gate = DisplayGate::from_settings(&config.engine);
    info!(
        conversation_id,
        displayed = gate.should_display(&result),
        "analysis complete"
    );

    let json = serde_json::to_string_pretty(&result).context("failed to serialize result")?;
    println!("{json}");
    Ok(())
}

fn parse_conversation_id(arg: Option<String>) -> anyhow::Result<ConversationId> {
    let raw = arg.ok_or_else(|| anyhow!("usage: parley <conversation-id>"))?;
    raw.trim()
        .parse()
        .with_context(|| format!("invalid conversation id {raw:?}"))
}

/// Initialize tracing to stderr, filtered by `RUST_LOG`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("parley_engine=info,parley_core=info,parley_llm=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
