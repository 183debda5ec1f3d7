use std::path::PathBuf;

use anyhow::{Context, Result};
use cgtool_core::client::MediaWikiClient;
use cgtool_core::dicts::{DictFileStatus, read_commit_pins, sync_dicts};
use cgtool_core::merge::merge_groups;
use cgtool_core::pipeline::fetch_cgroups;
use cgtool_core::store::{load_groups, write_artifact, write_group};
use cgtool_core::validate::check_groups;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "cgtool",
    version,
    about = "Fetches zh.wikipedia conversion groups and packs them for the web UI"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        default_value = "data/cgroups",
        help = "Directory holding one JSON file per conversion group"
    )]
    groups_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Fetch conversion groups from the wiki into the groups directory")]
    Update,
    #[command(about = "Merge stored groups into the single web artifact")]
    Merge(MergeArgs),
    #[command(about = "Advisory consistency check over stored conversion values")]
    Check,
    #[command(name = "sync-dicts", about = "Refresh pinned upstream dictionaries")]
    SyncDicts(SyncDictsArgs),
}

#[derive(Debug, Args)]
struct MergeArgs {
    #[arg(
        long,
        value_name = "PATH",
        default_value = "web/public/cgroups.json",
        help = "Output path for the merged artifact"
    )]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct SyncDictsArgs {
    #[arg(long, value_name = "PATH", default_value = "build.rs")]
    build_rs: PathBuf,
    #[arg(long, value_name = "PATH", default_value = "data")]
    dest_dir: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Update => run_update(&cli.groups_dir),
        Commands::Merge(args) => run_merge(&cli.groups_dir, &args.output),
        Commands::Check => run_check(&cli.groups_dir),
        Commands::SyncDicts(args) => run_sync_dicts(&args),
    }
}

fn run_update(groups_dir: &PathBuf) -> Result<()> {
    let mut client = MediaWikiClient::from_env()?;
    let report = fetch_cgroups(&mut client)?;

    for (nth, page) in report.pages.iter().enumerate() {
        match page.detail.as_deref() {
            Some(detail) => println!("no.{} {}: {} ({detail})", nth + 1, page.title, page.action),
            None => println!("no.{} {}: {}", nth + 1, page.title, page.action),
        }
    }

    for group in &report.groups {
        let path = write_group(groups_dir, group)
            .with_context(|| format!("failed to store group {}", group.name))?;
        println!("wrote {}", path.display());
    }

    let stats = &report.stats;
    println!(
        "{} page(s) attempted, {} group(s) fetched with {} empty, {} failed.",
        stats.attempted,
        report.groups.len(),
        stats.empties.len(),
        stats.failures.len()
    );
    if !stats.empties.is_empty() {
        println!("empty: {}", stats.empties.join(", "));
    }
    if !stats.failures.is_empty() {
        println!("failed: {}", stats.failures.join(", "));
    }
    println!("requests: {}", report.request_count);
    Ok(())
}

fn run_merge(groups_dir: &PathBuf, output: &PathBuf) -> Result<()> {
    let groups = load_groups(groups_dir)?;
    let artifact = merge_groups(&groups);
    write_artifact(output, &artifact)?;

    println!("merged {} group(s) into {}", groups.len(), output.display());
    println!("entries: {}", artifact.data.len());
    eprintln!(
        "Remember to apply `zhconv --wikitext Zh` to the artifact for rules in titles/descriptions."
    );
    Ok(())
}

fn run_check(groups_dir: &PathBuf) -> Result<()> {
    let groups = load_groups(groups_dir)?;
    let report = check_groups(&groups);

    println!(
        "checked {} rule(s) across {} group(s)",
        report.rules_checked, report.groups_checked
    );
    for diagnostic in &report.diagnostics {
        println!(
            "[{}] {}: {}",
            diagnostic.group, diagnostic.detail, diagnostic.conv
        );
    }
    println!("diagnostics: {}", report.diagnostics.len());
    Ok(())
}

fn run_sync_dicts(args: &SyncDictsArgs) -> Result<()> {
    let commits = read_commit_pins(&args.build_rs)?;
    println!("OpenCC commit: {}", commits.opencc);
    println!("MediaWiki commit: {}", commits.mediawiki);

    let report = sync_dicts(&commits, &args.dest_dir)?;
    for file in &report.files {
        match (file.status, &file.previous_sha256) {
            (DictFileStatus::Unchanged, _) => println!("{}: unchanged", file.name),
            (DictFileStatus::Updated, Some(previous)) => {
                println!("{}: updated {previous} -> {}", file.name, file.sha256);
            }
            _ => println!("{}: created {}", file.name, file.sha256),
        }
    }
    println!(
        "created: {}, updated: {}, unchanged: {}",
        report.created, report.updated, report.unchanged
    );
    Ok(())
}
