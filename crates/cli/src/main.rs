use clap::{Parser, Subcommand};
use anyhow::{Context, Result};

use mating_inbreeding_core::data::read_ancestor_records;
use mating_inbreeding_core::genetics::{AncestorRecord, AttachPolicy, MemoScopeKind, PathMode};
use mating_inbreeding_core::mating::{
    rank_by_coefficient, IndividualInbreeding, MatingBatch, MatingResult, PedigreeSession,
    SessionConfig, UnitGranularity,
};

#[derive(Parser)]
#[command(name = "openmate")]
#[command(version)]
#[command(about = "Expected offspring inbreeding for candidate matings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pair one female with every male candidate
    Mate {
        /// CSV with the female's record (first identifiable row is used)
        #[arg(short, long)]
        female: String,

        /// CSV with one record per male candidate
        #[arg(short, long)]
        males: String,

        /// Optional CSV with extra records extending either side's ancestry
        #[arg(long)]
        ancestry: Option<String>,

        /// Path mode: "full" (default) or "independent"
        #[arg(long, default_value = "full")]
        mode: String,

        /// Memoization scope: "unit" (default), "none" or "process"
        #[arg(long, default_value = "unit")]
        scope: String,

        /// Parent attachment policy: "first-wins" (default) or "overwrite"
        #[arg(long, default_value = "first-wins")]
        attach: String,

        /// Build an isolated pedigree for every pair instead of one per batch
        #[arg(long)]
        per_pair: bool,

        /// Sort output from least to most inbred offspring
        #[arg(long)]
        rank: bool,

        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Report each record subject's own inbreeding coefficient
    Inbreeding {
        /// CSV of flattened ancestor records
        #[arg(short, long)]
        records: String,

        /// Path mode: "full" (default) or "independent"
        #[arg(long, default_value = "full")]
        mode: String,

        /// Parent attachment policy: "first-wins" (default) or "overwrite"
        #[arg(long, default_value = "first-wins")]
        attach: String,

        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Mate {
            female,
            males,
            ancestry,
            mode,
            scope,
            attach,
            per_pair,
            rank,
            format,
        } => {
            let granularity = if per_pair {
                UnitGranularity::PerPair
            } else {
                UnitGranularity::PerBatch
            };
            let config = SessionConfig::new()
                .path_mode(parse_mode(&mode)?)
                .memo_scope(parse_scope(&scope)?)
                .attach_policy(parse_attach(&attach)?)
                .granularity(granularity);
            cmd_mate(&female, &males, ancestry.as_deref(), config, rank, &format)
        }
        Commands::Inbreeding {
            records,
            mode,
            attach,
            format,
        } => {
            let config = SessionConfig::new()
                .path_mode(parse_mode(&mode)?)
                .attach_policy(parse_attach(&attach)?);
            cmd_inbreeding(&records, config, &format)
        }
    }
}

fn parse_mode(mode: &str) -> Result<PathMode> {
    match mode.to_lowercase().as_str() {
        "full" | "full-accumulation" => Ok(PathMode::FullAccumulation),
        "independent" | "independent-paths" => Ok(PathMode::IndependentPaths),
        other => anyhow::bail!("Unknown mode '{}'. Use 'full' (default) or 'independent'.", other),
    }
}

fn parse_scope(scope: &str) -> Result<MemoScopeKind> {
    match scope.to_lowercase().as_str() {
        "none" => Ok(MemoScopeKind::None),
        "unit" | "per-unit" => Ok(MemoScopeKind::PerUnit),
        "process" | "process-wide" => Ok(MemoScopeKind::ProcessWide),
        other => anyhow::bail!(
            "Unknown scope '{}'. Use 'unit' (default), 'none' or 'process'.",
            other
        ),
    }
}

fn parse_attach(attach: &str) -> Result<AttachPolicy> {
    match attach.to_lowercase().as_str() {
        "first-wins" | "first" => Ok(AttachPolicy::FirstWins),
        "overwrite" => Ok(AttachPolicy::Overwrite),
        other => anyhow::bail!(
            "Unknown attach policy '{}'. Use 'first-wins' (default) or 'overwrite'.",
            other
        ),
    }
}

fn load(path: &str, what: &str) -> Result<Vec<AncestorRecord>> {
    let records = read_ancestor_records(path)
        .with_context(|| format!("Failed to load {} records from '{}'", what, path))?;
    eprintln!("Loaded {} {} records from '{}'", records.len(), what, path);
    Ok(records)
}

fn cmd_mate(
    female_path: &str,
    males_path: &str,
    ancestry_path: Option<&str>,
    config: SessionConfig,
    rank: bool,
    output_format: &str,
) -> Result<()> {
    let female_records = load(female_path, "female")?;
    let subject = female_records
        .iter()
        .find(|r| r.subject().is_some())
        .cloned()
        .with_context(|| format!("No identifiable female record in '{}'", female_path))?;
    if female_records.len() > 1 {
        log::warn!(
            "'{}' holds {} records; using '{}'",
            female_path,
            female_records.len(),
            subject.subject().unwrap_or_default()
        );
    }

    let partners = load(males_path, "male")?;
    let ancestry = match ancestry_path {
        Some(path) => load(path, "ancestry")?,
        None => Vec::new(),
    };

    eprintln!(
        "Pairing with mode={:?}, scope={:?}, attach={:?}, granularity={:?}",
        config.path_mode, config.memo_scope, config.attach_policy, config.granularity
    );

    let session = PedigreeSession::new(config);
    let batch = MatingBatch::new(subject, partners).with_ancestry(ancestry);
    let mut results = session
        .try_mate_batch(&batch)
        .context("Failed to evaluate matings")?;

    if rank {
        rank_by_coefficient(&mut results);
    }

    match output_format.to_lowercase().as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => print_matings(&results),
    }

    Ok(())
}

fn cmd_inbreeding(records_path: &str, config: SessionConfig, output_format: &str) -> Result<()> {
    let records = load(records_path, "pedigree")?;
    let session = PedigreeSession::new(config);
    let report = session.inbreeding_report(&records);

    match output_format.to_lowercase().as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report(&report),
    }

    Ok(())
}

fn print_matings(results: &[MatingResult]) {
    println!("{:<20} {:<20} {:>12}", "subject", "partner", "F");
    for r in results {
        let flag = if r.cycle_detected { "  (cycle)" } else { "" };
        println!(
            "{:<20} {:<20} {:>12.8}{}",
            r.subject_id, r.partner_id, r.coefficient, flag
        );
    }
}

fn print_report(report: &[IndividualInbreeding]) {
    println!("{:<20} {:>12}", "id", "F");
    for r in report {
        let flag = if r.cycle_detected { "  (cycle)" } else { "" };
        println!("{:<20} {:>12.8}{}", r.id, r.coefficient, flag);
    }
}
