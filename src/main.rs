//! CLI entry point for domweave

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use domweave::{EngineConfig, TemplateEngine, Value};

#[derive(Parser)]
#[command(name = "domweave")]
#[command(version)]
#[command(about = "Render HTML templates with data-* directives and {{ placeholders }}", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./domweave.yml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Template directory, overriding the configuration
    #[arg(short, long, global = true)]
    templates: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template
    #[command(alias = "r")]
    Render {
        /// Template name, relative to the template directory
        template: String,

        /// JSON or YAML file with template variables
        #[arg(long)]
        vars: Option<PathBuf>,

        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List templates
    List,

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "domweave=debug,info"
    } else {
        "domweave=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default(std::env::current_dir()?)?,
    };
    if let Some(dir) = cli.templates {
        config.template_dir = dir;
    }

    match cli.command {
        Commands::Render {
            template,
            vars,
            output,
        } => {
            let variables = match vars {
                Some(path) => load_variables(&path)?,
                None => IndexMap::new(),
            };
            tracing::info!("Rendering {} from {:?}", template, config.template_dir);

            let mut engine = TemplateEngine::from_config(&config);
            let html = engine.render(&template, &variables)?;

            match output {
                Some(path) => {
                    fs::write(&path, html)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    tracing::info!("Wrote {:?}", path);
                }
                None => println!("{}", html),
            }
        }

        Commands::List => {
            let engine = TemplateEngine::from_config(&config);
            let names = engine.template_names();
            println!("Templates in {:?} ({}):", config.template_dir, names.len());
            for name in names {
                println!("  {}", name);
            }
        }

        Commands::Version => {
            println!("domweave version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Read variables from a JSON or YAML file, chosen by extension
fn load_variables(path: &Path) -> Result<IndexMap<String, Value>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let json: serde_json::Value = match ext.as_str() {
        "json" => serde_json::from_str(&content)?,
        "yml" | "yaml" => serde_yaml::from_str(&content)?,
        _ => bail!("Unsupported variables file {:?} (expected .json, .yml or .yaml)", path),
    };

    match Value::from_json(&json) {
        Value::Map(map) => Ok(map),
        _ => bail!("Variables file {:?} must contain a mapping", path),
    }
}
