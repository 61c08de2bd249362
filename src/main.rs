//! pt-relay - apply and check declarative mapping rules.
//!
//! Usage:
//!   pt-relay map --rules <rules.yaml> --documents <docs.json>   Apply rules and print the documents
//!   pt-relay validate --rules <rules.yaml>                       Check a rules file without applying it

use clap::{Parser, Subcommand};
use petit_relay::mapping::SourceStrategy;
use petit_relay::{
    JsonPath, MappingEngine, MappingRule, RelayConfig, UnsupportedEvaluator, YamlLoader,
};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// pt-relay - declarative data mapping for workflow tasks
#[derive(Parser)]
#[command(name = "pt-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Relay configuration file (defaults apply when omitted)
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a rules file to a set of documents and print the result
    Map {
        /// YAML or JSON list of mapping rules
        #[arg(short, long, value_name = "RULES")]
        rules: PathBuf,

        /// JSON object with optional `context`, `input` and `output` maps
        #[arg(short, long, value_name = "DOCUMENTS")]
        documents: PathBuf,
    },

    /// Check a rules file and report rules that would be skipped
    Validate {
        /// YAML or JSON list of mapping rules
        #[arg(short, long, value_name = "RULES")]
        rules: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => YamlLoader::load_relay_config(path)?,
        None => RelayConfig::default(),
    };

    match cli.command {
        Commands::Map { rules, documents } => {
            map_documents(&config, &rules, &documents)?;
        }
        Commands::Validate { rules } => {
            validate_rules(&rules)?;
        }
    }

    Ok(())
}

/// Apply a rules file to a documents file and print the result.
fn map_documents(
    config: &RelayConfig,
    rules_path: &Path,
    documents_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let rules = YamlLoader::load_rules(rules_path)?;
    let mut documents: Map<String, Value> =
        serde_json::from_str(&std::fs::read_to_string(documents_path)?)?;

    let mut context = take_document(&mut documents, "context")?;
    let mut input = take_document(&mut documents, "input")?;
    let mut output = take_document(&mut documents, "output")?;

    // No expression language is bundled; rules with a transform fail.
    let engine = MappingEngine::new(config.mapping.clone(), Arc::new(UnsupportedEvaluator));
    engine.mapping(&mut context, &mut input, &mut output, &rules)?;

    let result = serde_json::json!({
        "context": context,
        "input": input,
        "output": output,
    });
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn take_document(
    documents: &mut Map<String, Value>,
    name: &str,
) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    match documents.remove(name) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(format!("'{}' must be a JSON object, found {}", name, other).into()),
    }
}

/// Validate a rules file without applying it.
fn validate_rules(rules_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating rules in: {}", rules_path.display());
    let rules = YamlLoader::load_rules(rules_path)?;
    let usable: Vec<usize> = MappingEngine::usable_rules(&rules).map(|(i, _)| i).collect();

    let mut errors = 0;
    for (index, rule) in rules.iter().enumerate() {
        if !usable.contains(&index) {
            warn!("  - rule #{} (target '{}'): skipped, needs a target and a source or transform", index, rule.target);
            continue;
        }
        let problems = path_problems(rule);
        if problems.is_empty() {
            info!("  - rule #{} (target '{}'): OK", index, rule.target);
        }
        for problem in problems {
            error!("  - rule #{}: {}", index, problem);
            errors += 1;
        }
    }

    if errors > 0 {
        return Err(format!("{} problem(s) found in {}", errors, rules_path.display()).into());
    }
    info!("All {} rule(s) are valid, {} usable", rules.len(), usable.len());
    Ok(())
}

fn path_problems(rule: &MappingRule) -> Vec<String> {
    let mut problems = Vec::new();
    match JsonPath::parse(&rule.target) {
        Ok(path) if path.has_wildcard() => {
            problems.push(format!("target '{}' contains a wildcard", rule.target))
        }
        Ok(path) if path.segments().is_empty() => {
            problems.push("target cannot be the document root".to_string())
        }
        Ok(_) => {}
        Err(e) => problems.push(format!("target: {}", e)),
    }
    if let Some(SourceStrategy::Path(source)) = rule.source.as_deref().map(SourceStrategy::classify) {
        if let Err(e) = JsonPath::parse(source) {
            problems.push(format!("source: {}", e));
        }
    }
    problems
}
