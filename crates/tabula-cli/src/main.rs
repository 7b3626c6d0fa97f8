//! `tabula` command-line tool.
//!
//! Usage:
//!     tabula schema
//!     tabula generate [--no-rebuild]
//!     tabula status
//!     tabula clear
//!     tabula inspect [SNAPSHOT]

mod args;

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use args::{Args, Command};
use tabula_core::codec;
use tabula_data::plan;
use tabula_data::rebuild::{NoRebuild, RebuildTrigger};
use tabula_data::{
    ContinuationStore, FileContinuationStore, ProjectConfig, RecompileCoordinator, TabularSource,
    TracingSink, schema,
};

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn,tabula=info",
        1 => "warn,tabula=debug",
        _ => "tabula=trace,debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_target(verbose > 0))
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<ProjectConfig> {
    match &args.config {
        Some(path) => ProjectConfig::load(path)
            .with_context(|| format!("loading {}", path.display())),
        None => ProjectConfig::discover(Path::new(".")).context("loading tabula.toml"),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let config = load_config(&args)?;

    match args.command {
        Command::Schema { json } => print_schemas(&config, json),
        Command::Generate { no_rebuild } => generate(&config, no_rebuild),
        Command::Status => status(&config),
        Command::Clear => {
            FileContinuationStore::new(&config.continuation_path).clear()?;
            println!("no generation pending");
            Ok(())
        }
        Command::Inspect { snapshot } => {
            inspect(snapshot.as_deref().unwrap_or(&config.snapshot_path))
        }
    }
}

fn print_schemas(config: &ProjectConfig, json: bool) -> anyhow::Result<()> {
    let sources = config.csv_sources();
    let refs: Vec<&dyn TabularSource> = sources.iter().map(|s| s as &dyn TabularSource).collect();
    let schemas = schema::read_all(&refs, &TracingSink);

    if json {
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }
    for table in &schemas {
        println!("{} ({})", table.table_name, table.source);
        for column in &table.columns {
            let key = column
                .key_priority
                .map(|p| format!("  key #{p}"))
                .unwrap_or_default();
            println!("  {:<24} {:<12}{key}", column.name, column.declared_type.raw());
        }
        match plan::plan_index(table) {
            Ok(Some(index)) => {
                let chain: Vec<&str> = index.chain.iter().map(|k| k.name.as_str()).collect();
                println!("  index: {}", chain.join(" -> "));
            }
            Ok(None) => println!("  index: none"),
            Err(e) => println!("  index: none ({e})"),
        }
    }
    Ok(())
}

fn generate(config: &ProjectConfig, no_rebuild: bool) -> anyhow::Result<()> {
    let sources = config.csv_sources();
    let refs: Vec<&dyn TabularSource> = sources.iter().map(|s| s as &dyn TabularSource).collect();
    let store = FileContinuationStore::new(&config.continuation_path);
    let sink = TracingSink;

    let mut trigger: Box<dyn RebuildTrigger> = match config.rebuild_command()? {
        Some(command) if !no_rebuild => Box::new(command),
        _ => Box::new(NoRebuild::succeeded()),
    };

    let mut coordinator = RecompileCoordinator::new(config.coordinator_settings(), &store, &sink);
    let report = coordinator.generate(&refs, trigger.as_mut())?;

    println!(
        "generated {} tables ({} indices) into {}",
        report.tables.len(),
        report.index_types.len(),
        config.generated_path.display()
    );
    println!("session {}", report.session_tag);
    println!(
        "call RecompileCoordinator::resume::<{}>() from the rebuilt host to write {}",
        config.container_name,
        config.snapshot_path.display()
    );
    Ok(())
}

fn status(config: &ProjectConfig) -> anyhow::Result<()> {
    let store = FileContinuationStore::new(&config.continuation_path);
    match store.load()? {
        Some(pending) => {
            println!("pending session {}", pending.session_tag);
            println!("  generated: {}", pending.generated_path.display());
            println!("  snapshot:  {}", pending.snapshot_path.display());
            for table in &pending.tables {
                println!("  table {} ({})", table.table_name, table.source);
            }
        }
        None => println!("no generation pending"),
    }
    Ok(())
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let header = codec::read_header(&bytes)?;
    println!("{}", path.display());
    println!("  format version: {}", header.version);
    println!("  session:        {}", header.session_tag);
    println!("  tables:         {}", header.table_count);
    println!("  size:           {} bytes", bytes.len());
    Ok(())
}
