//! Tensor Info - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tensor_catalog::store::{SizeReport, format_size};
use tensor_catalog::{CatalogBuilder, CatalogQuery, InspectConfig, NameScope, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "tensor-info")]
#[command(about = "Print tensor information from a safetensors model", long_about = None)]
#[command(version)]
struct Cli {
    /// Name of the tensor to inspect
    tensor_name: Option<String>,

    /// Path to the model directory (default: MODEL_PATH environment variable)
    #[arg(short, long)]
    model_path: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List unique tensor patterns (layer numbers replaced with #)
    #[arg(short = 'l', long)]
    list_all_short: bool,

    /// List all tensor names with actual layer numbers
    #[arg(short = 'L', long, visible_alias = "la", conflicts_with = "list_all_short")]
    list_all: bool,

    /// Show dtype, shape, and size for each tensor when listing
    #[arg(short, long)]
    sizes: bool,

    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,

    /// Maximum number of shard headers read at once
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

enum Command {
    List(NameScope),
    Show(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so listings stay pipeable
    match cli.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    let mut config = InspectConfig::load(cli.config)?;

    // CLI overrides
    if let Some(model_path) = cli.model_path {
        config.model_path = Some(model_path);
    }
    if let Some(limit) = cli.max_concurrency {
        config.max_concurrency = Some(limit);
    }
    if cli.sizes {
        config.show_sizes = true;
    }
    if cli.json {
        config.output = OutputFormat::Json;
    }

    config.validate()?;

    let command = if cli.list_all_short {
        Command::List(NameScope::Unique)
    } else if cli.list_all {
        Command::List(NameScope::All)
    } else if let Some(name) = cli.tensor_name {
        Command::Show(name)
    } else {
        anyhow::bail!("tensor_name is required when not using --list-all-short or --list-all");
    };

    let model_path = config
        .model_path
        .clone()
        .context("Model path not configured")?;

    tracing::debug!(
        model_path = %model_path.display(),
        max_concurrency = ?config.max_concurrency,
        "Configuration loaded"
    );

    let catalog = CatalogBuilder::open(&model_path)?
        .build_concurrent(config.max_concurrency)
        .await
        .with_context(|| format!("Failed to build catalog for {}", model_path.display()))?;
    let query = CatalogQuery::new(&catalog);

    match command {
        Command::List(scope) => print_listing(&query, scope, &config)?,
        Command::Show(name) => print_tensor(&query, &name, config.output)?,
    }

    Ok(())
}

fn print_listing(query: &CatalogQuery<'_>, scope: NameScope, config: &InspectConfig) -> Result<()> {
    if !config.show_sizes {
        let names = query.list_names(scope);
        match config.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
            OutputFormat::Text => names.iter().for_each(|name| println!("{name}")),
        }
        return Ok(());
    }

    let report = query.aggregate_size(scope);
    match config.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            print_size_report(&report);
            if let Some(declared) = query.catalog().declared_total_size()
                && scope == NameScope::All
                && declared != report.total_bytes
            {
                println!("Index declares: {}", format_size(declared));
            }
        }
    }

    Ok(())
}

fn print_size_report(report: &SizeReport<'_>) {
    let name_width = report
        .rows
        .iter()
        .map(|row| row.display_name.len())
        .max()
        .unwrap_or(0);

    for row in &report.rows {
        let shape = format!("{:?}", row.entry.shape);
        println!(
            "{:name_width$}  {:6}  {:30}  {}",
            row.display_name,
            row.entry.dtype.as_str(),
            shape,
            format_size(row.entry.byte_size)
        );
    }

    println!("\nTotal: {}", format_size(report.total_bytes));
}

fn print_tensor(query: &CatalogQuery<'_>, name: &str, output: OutputFormat) -> Result<()> {
    let entry = query.lookup(name).with_context(|| {
        format!(
            "Could not find tensor in model at {}",
            query.catalog().root().display()
        )
    })?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entry)?),
        OutputFormat::Text => {
            println!("Tensor: {}", entry.name);
            println!("File:   {}", entry.shard);
            println!("Shape:  {:?}", entry.shape);
            println!("Dtype:  {}", entry.dtype);
            println!("Size:   {}", format_size(entry.byte_size));
        }
    }

    Ok(())
}
