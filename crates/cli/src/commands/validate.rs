//! `validate` command implementation.

use anyhow::{Context, Result};
use dispatcher::SinkRegistry;
use extractors::ExtractorRegistry;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    start_block_num: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_block_num: Option<u32>,
    prefix: String,
    extractor_count: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let pipeline = &blueprint.pipeline;
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    start_block_num: pipeline.start_block_num,
                    stop_block_num: pipeline.stop_block_num,
                    prefix: pipeline.prefix.clone(),
                    extractor_count: pipeline.extractors.len(),
                    sink_count: pipeline.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
///
/// Unknown names are not errors: the pipeline skips them at startup.
fn collect_warnings(blueprint: &contracts::PipelineBlueprint) -> Vec<String> {
    let mut warnings = config_loader::warnings(blueprint);

    let extractors = ExtractorRegistry::builtin();
    for name in &blueprint.pipeline.extractors {
        if !extractors.contains(name) {
            warnings.push(format!("Unknown extractor '{name}' will be skipped"));
        }
    }

    let sinks = SinkRegistry::builtin();
    for name in &blueprint.pipeline.sinks {
        if !sinks.contains(name) {
            warnings.push(format!("Unknown sink '{name}' will be skipped"));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Start height: {}", summary.start_block_num);
            if let Some(stop) = summary.stop_block_num {
                println!("  Stop height: {}", stop);
            }
            println!("  Prefix: {}", summary.prefix);
            println!("  Extractors: {}", summary.extractor_count);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
