//! `info` command implementation.

use anyhow::{Context, Result};
use dispatcher::{table_name, SinkRegistry};
use extractors::ExtractorRegistry;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Registry info for JSON output
#[derive(Serialize)]
struct RegistryInfo {
    prefix: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extractors: Vec<ExtractorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct ExtractorInfo {
    name: String,
    table: String,
    selected: bool,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    selected: bool,
    options: Vec<OptionInfo>,
}

#[derive(Serialize)]
struct OptionInfo {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<String>,
    description: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let blueprint = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration info");
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => contracts::PipelineBlueprint::default(),
    };

    let info = build_registry_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize registry info")?;
        println!("{}", json);
    } else {
        print_registry_info(&info);
    }

    Ok(())
}

fn build_registry_info(blueprint: &contracts::PipelineBlueprint, args: &InfoArgs) -> RegistryInfo {
    // Neither flag means both
    let show_all = !args.extractors && !args.sinks;
    let pipeline = &blueprint.pipeline;

    let extractors = if show_all || args.extractors {
        ExtractorRegistry::builtin()
            .names()
            .map(|name| ExtractorInfo {
                name: name.to_string(),
                table: table_name(&pipeline.prefix, name),
                selected: pipeline.extractors.iter().any(|s| s == name),
            })
            .collect()
    } else {
        Vec::new()
    };

    let sinks = if show_all || args.sinks {
        SinkRegistry::builtin()
            .configure_all()
            .into_iter()
            .map(|(name, options)| SinkInfo {
                selected: pipeline.sinks.contains(&name),
                name,
                options: options
                    .into_iter()
                    .map(|option| OptionInfo {
                        key: option.key.to_string(),
                        default: option.default,
                        description: option.description.to_string(),
                    })
                    .collect(),
            })
            .collect()
    } else {
        Vec::new()
    };

    RegistryInfo {
        prefix: pipeline.prefix.clone(),
        extractors,
        sinks,
    }
}

fn print_registry_info(info: &RegistryInfo) {
    let mark = |selected: bool| if selected { "*" } else { " " };

    if !info.extractors.is_empty() {
        println!("\n=== Extractors ({}) ===\n", info.extractors.len());
        for extractor in &info.extractors {
            println!(
                " {} {:<32} {}",
                mark(extractor.selected),
                extractor.name,
                extractor.table
            );
        }
    }

    if !info.sinks.is_empty() {
        println!("\n=== Sinks ({}) ===\n", info.sinks.len());
        for sink in &info.sinks {
            println!(" {} {}", mark(sink.selected), sink.name);
            for option in &sink.options {
                match &option.default {
                    Some(default) => println!(
                        "     {:<20} {} (default: {})",
                        option.key, option.description, default
                    ),
                    None => println!("     {:<20} {}", option.key, option.description),
                }
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extractors: bool, sinks: bool) -> InfoArgs {
        InfoArgs {
            config: None,
            json: true,
            extractors,
            sinks,
        }
    }

    #[test]
    fn test_lists_everything_by_default() {
        let mut blueprint = contracts::PipelineBlueprint::default();
        blueprint.pipeline.prefix = "bos".to_string();
        blueprint.pipeline.extractors = vec!["es::Transfer".to_string()];

        let info = build_registry_info(&blueprint, &args(false, false));
        assert_eq!(info.extractors.len(), 17);
        assert_eq!(info.sinks.len(), 5);

        let transfer = info.extractors.iter().find(|e| e.name == "es::Transfer").unwrap();
        assert_eq!(transfer.table, "bos.es.transfer");
        assert!(transfer.selected);

        let http = info.sinks.iter().find(|s| s.name == "http").unwrap();
        assert!(http.options.iter().any(|o| o.key == "endpoints"));
    }

    #[test]
    fn test_sinks_only() {
        let info = build_registry_info(&contracts::PipelineBlueprint::default(), &args(false, true));
        assert!(info.extractors.is_empty());
        assert!(!info.sinks.is_empty());
    }
}
