//! `docq ask` — One-shot documentation question from the terminal.

use std::io::Write;
use std::sync::Arc;

use docq_config::AppConfig;
use docq_context::TokenCounter;
use docq_core::RawMessage;
use docq_pipeline::{ChatPipeline, PipelineSettings};

pub async fn run(
    question: &str,
    variant: Option<&str>,
    no_stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for an API key early — give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    DOCQ_API_KEY   = 'sk-...'");
        eprintln!("    OPENAI_API_KEY = 'sk-...'");
        eprintln!();
        eprintln!("  Or add api_key to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    if config.retrieval.index_url.is_empty() {
        return Err("retrieval.index_url is not configured — set it or DOCQ_INDEX_URL".into());
    }

    let openai = docq_providers::build_from_config(&config);
    let index = docq_retrieval::build_from_config(&config);
    let counter = TokenCounter::shared(&config.model);

    let pipeline = Arc::new(ChatPipeline::new(
        openai.clone(),
        openai.clone(),
        openai,
        index,
        counter,
        PipelineSettings::from_config(&config),
    ));

    let messages = vec![RawMessage::new("user", question)];

    if no_stream {
        let answer = pipeline.answer(&messages, variant).await?;
        println!("{answer}");
        return Ok(());
    }

    let mut rx = pipeline.answer_stream(&messages, variant).await?;
    let mut stdout = std::io::stdout();
    while let Some(fragment) = rx.recv().await {
        let fragment = fragment?;
        stdout.write_all(fragment.as_bytes())?;
        stdout.flush()?;
    }
    println!();

    Ok(())
}
