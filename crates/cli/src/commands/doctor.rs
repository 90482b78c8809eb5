//! `docq doctor` — Diagnose configuration and upstream health.

use docq_config::AppConfig;
use docq_core::capability::{ChatCompletion, VectorIndex};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("docq doctor — diagnostics");
    println!("=========================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    let config = match AppConfig::load() {
        Ok(config) => {
            if config_path.exists() {
                println!("  [ok]   config file valid");
            } else {
                println!("  [ok]   no config file, using defaults + environment");
            }
            config
        }
        Err(e) => {
            println!("  [fail] config invalid: {e}");
            return Err("Fix the config file and re-run doctor.".into());
        }
    };

    // Check API key
    if config.has_api_key() {
        println!("  [ok]   API key configured");
    } else {
        println!("  [warn] no API key — set OPENAI_API_KEY or api_key in config.toml");
        issues += 1;
    }

    // Check model endpoint reachability
    if config.has_api_key() {
        let openai = docq_providers::build_from_config(&config);
        match openai.health_check().await {
            Ok(true) => println!("  [ok]   model endpoint reachable"),
            Ok(false) => {
                println!("  [warn] model endpoint rejected the health check");
                issues += 1;
            }
            Err(e) => {
                println!("  [warn] model endpoint unreachable: {e}");
                issues += 1;
            }
        }
    }

    // Check vector index
    if config.retrieval.index_url.is_empty() {
        println!("  [warn] no vector index configured — set retrieval.index_url");
        issues += 1;
    } else {
        let index = docq_retrieval::build_from_config(&config);
        match index.health_check().await {
            Ok(true) => println!("  [ok]   vector index reachable"),
            Ok(false) => {
                println!("  [warn] vector index rejected the health check");
                issues += 1;
            }
            Err(e) => {
                println!("  [warn] vector index unreachable: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  all checks passed");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
