use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use xshape_core::config::Config;
use xshape_core::{Check, PrettyPrintOptions, TransformOptions, Transformer};

#[derive(Parser)]
#[command(name = "xshape")]
#[command(about = "Shape XML documents into JSON with XPath templates")]
struct Cli {
    /// Maximum number of documents processed at once.
    #[arg(long, global = true)]
    workers: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a JSON template to a document.
    Transform {
        /// XML document, or `-` for stdin.
        #[arg(long)]
        xml: PathBuf,
        #[arg(long)]
        template: PathBuf,
        /// Reject malformed documents instead of printing `{}`.
        #[arg(long, value_parser = parse_check)]
        check: Option<Check>,
        #[arg(long)]
        compact: bool,
    },
    /// Convert a document into a generic JSON tree.
    ToJson {
        #[arg(long)]
        xml: PathBuf,
        #[arg(long, value_parser = parse_check)]
        check: Option<Check>,
        #[arg(long)]
        compact: bool,
    },
    /// Re-indent a document.
    Pretty {
        #[arg(long)]
        xml: PathBuf,
        #[arg(long, default_value_t = 2)]
        indent: usize,
        #[arg(long, value_parser = parse_check)]
        check: Option<Check>,
    },
    /// Verify that a document is well-formed.
    Check {
        #[arg(long)]
        xml: PathBuf,
    },
}

fn parse_check(value: &str) -> Result<Check, String> {
    value.parse().map_err(|e: xshape_core::ConfigError| e.to_string())
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn options(check: Option<Check>) -> TransformOptions {
    TransformOptions { check }
}

fn print_json(value: &serde_json::Value, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.workers.map(Config::new).unwrap_or_default();
    debug!(workers = config.max_workers(), "starting");
    let transformer = Transformer::new(config);

    match cli.command {
        Commands::Transform {
            xml,
            template,
            check,
            compact,
        } => {
            let template: serde_json::Value = serde_json::from_str(&read_input(&template)?)
                .context("template is not valid JSON")?;
            xshape_core::template::validate_template(&template).context("invalid template")?;
            let document = read_input(&xml)?;
            let output = transformer
                .transform(document, template, options(check))
                .await
                .context("transform failed")?;
            print_json(&output, compact)?;
        }
        Commands::ToJson {
            xml,
            check,
            compact,
        } => {
            let document = read_input(&xml)?;
            let output = transformer
                .to_json(document, options(check))
                .await
                .context("conversion failed")?;
            print_json(&output, compact)?;
        }
        Commands::Pretty { xml, indent, check } => {
            let document = read_input(&xml)?;
            let output = transformer
                .pretty_print(document, PrettyPrintOptions::new(indent), options(check))
                .await
                .context("pretty-print failed")?;
            print!("{output}");
        }
        Commands::Check { xml } => {
            let document = read_input(&xml)?;
            xshape_core::document::check_well_formed(&document)
                .with_context(|| format!("{} is not well-formed", xml.display()))?;
            println!("OK");
        }
    }

    Ok(())
}
