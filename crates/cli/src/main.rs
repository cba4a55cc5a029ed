use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use herdmate_core as core;
use core::data::{read_bull_registry, read_cow_registry};
use core::inbreeding::{write_audit_csv, InbreedingEngine, InbreedingResult};
use core::pedigree::{load_snapshot, save_snapshot, PedigreeGraph};
use core::types::DEFAULT_MAX_GENERATIONS;

#[derive(Parser)]
#[command(name = "herdmate")]
#[command(version)]
#[command(about = "Pedigree graph and Wright path-method inbreeding for dairy cattle")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the pedigree graph from registry extracts and save a snapshot
    Build {
        /// Path to the bull registry CSV (columns: reg, naab, sire, mgs, mmgs, gib)
        #[arg(short, long)]
        bulls: String,

        /// Path to a cow herd CSV to merge in (columns: cow, sire, dam, mgs, mmgs, gib)
        #[arg(short, long)]
        cows: Option<String>,

        /// Path the binary snapshot is written to
        #[arg(short, long)]
        snapshot: String,
    },

    /// Inbreeding coefficient of an animal in the graph
    Coefficient {
        /// Path to a snapshot written by `build`
        #[arg(short, long)]
        snapshot: String,

        /// Animal id (registration id or breeder code)
        #[arg(short, long)]
        animal: String,

        #[command(flatten)]
        query: QueryOpts,
    },

    /// Expected inbreeding of a planned mating (no offspring on record)
    Mating {
        /// Path to a snapshot written by `build`
        #[arg(short, long)]
        snapshot: String,

        /// Sire candidate id
        #[arg(long)]
        sire: String,

        /// Dam candidate id
        #[arg(long)]
        dam: String,

        #[command(flatten)]
        query: QueryOpts,
    },

    /// Additive genetic relationship between two animals
    Relationship {
        /// Path to a snapshot written by `build`
        #[arg(short, long)]
        snapshot: String,

        /// First animal id
        #[arg(long)]
        first: String,

        /// Second animal id
        #[arg(long)]
        second: String,

        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Options shared by the coefficient-producing queries.
#[derive(clap::Args)]
struct QueryOpts {
    /// Generation ceiling for ancestor enumeration
    #[arg(long, default_value_t = DEFAULT_MAX_GENERATIONS)]
    generations: usize,

    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text")]
    format: String,

    /// Write the contribution breakdown to this CSV file
    #[arg(long)]
    audit: Option<String>,

    /// Include one audit row per contributing path pair
    #[arg(long)]
    audit_paths: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            bulls,
            cows,
            snapshot,
        } => cmd_build(&bulls, cows.as_deref(), &snapshot),
        Commands::Coefficient {
            snapshot,
            animal,
            query,
        } => cmd_coefficient(&snapshot, &animal, &query),
        Commands::Mating {
            snapshot,
            sire,
            dam,
            query,
        } => cmd_mating(&snapshot, &sire, &dam, &query),
        Commands::Relationship {
            snapshot,
            first,
            second,
            format,
        } => cmd_relationship(&snapshot, &first, &second, &format),
    }
}

fn cmd_build(bulls_path: &str, cows_path: Option<&str>, snapshot_path: &str) -> Result<()> {
    let bull_rows = read_bull_registry(bulls_path)
        .with_context(|| format!("Failed to read bull registry from '{}'", bulls_path))?;
    eprintln!("Loaded {} bull rows from '{}'", bull_rows.len(), bulls_path);

    let mut graph = PedigreeGraph::from_bull_rows_with_progress(&bull_rows, |done, total| {
        eprintln!("  inserted {}/{} bulls", done, total);
    });

    if let Some(cows_path) = cows_path {
        let cow_rows = read_cow_registry(cows_path)
            .with_context(|| format!("Failed to read cow herd from '{}'", cows_path))?;
        eprintln!("Loaded {} cow rows from '{}'", cow_rows.len(), cows_path);

        let outcome = graph.merge_cow_rows(&cow_rows);
        eprintln!(
            "Merged cows: {} inserted, {} placeholders upgraded, {} enriched",
            outcome.inserted, outcome.upgraded, outcome.enriched
        );
    }

    save_snapshot(&graph, snapshot_path)
        .with_context(|| format!("Failed to write snapshot to '{}'", snapshot_path))?;

    println!(
        "Graph built: {} animals ({} virtual), {} breeder codes",
        graph.len(),
        graph.n_virtual(),
        graph.resolver().len()
    );
    println!("Snapshot written to '{}'", snapshot_path);
    Ok(())
}

fn load_engine(snapshot_path: &str, generations: usize) -> Result<InbreedingEngine> {
    let Some(snapshot) = load_snapshot(snapshot_path) else {
        anyhow::bail!(
            "Snapshot '{}' is missing or unreadable; rebuild it with 'herdmate build'",
            snapshot_path
        );
    };
    eprintln!(
        "Loaded snapshot '{}': {} animals",
        snapshot_path,
        snapshot.graph.len()
    );
    Ok(InbreedingEngine::with_max_generations(
        snapshot.graph,
        generations,
    ))
}

fn cmd_coefficient(snapshot_path: &str, animal: &str, query: &QueryOpts) -> Result<()> {
    let engine = load_engine(snapshot_path, query.generations)?;
    let result = engine.coefficient(animal);

    report_result(animal, &result, query)
}

fn cmd_mating(snapshot_path: &str, sire: &str, dam: &str, query: &QueryOpts) -> Result<()> {
    let engine = load_engine(snapshot_path, query.generations)?;
    let result = engine.mating_coefficient(sire, dam);

    let subject = format!("{}x{}", sire, dam);
    report_result(&subject, &result, query)
}

fn cmd_relationship(snapshot_path: &str, first: &str, second: &str, format: &str) -> Result<()> {
    let engine = load_engine(snapshot_path, DEFAULT_MAX_GENERATIONS)?;
    let relationship = engine.relationship_coefficient(first, second);

    match format.to_lowercase().as_str() {
        "json" => {
            let mut map = serde_json::Map::new();
            map.insert("first".to_string(), serde_json::json!(first));
            map.insert("second".to_string(), serde_json::json!(second));
            map.insert("relationship".to_string(), serde_json::json!(relationship));
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::Value::Object(map))?
            );
        }
        "text" => {
            println!(
                "Relationship between '{}' and '{}': {:.6} ({:.2}%)",
                first,
                second,
                relationship,
                relationship * 100.0
            );
        }
        other => anyhow::bail!("Unknown format '{}'. Use 'text' (default) or 'json'.", other),
    }
    Ok(())
}

fn report_result(subject: &str, result: &InbreedingResult, query: &QueryOpts) -> Result<()> {
    match query.format.to_lowercase().as_str() {
        "json" => print_json(subject, result)?,
        "text" => println!("{}", result.summary()),
        other => anyhow::bail!("Unknown format '{}'. Use 'text' (default) or 'json'.", other),
    }

    if let Some(audit_path) = &query.audit {
        write_audit_csv(subject, result, audit_path, query.audit_paths)
            .with_context(|| format!("Failed to write audit file to '{}'", audit_path))?;
        eprintln!("Audit breakdown written to '{}'", audit_path);
    }
    Ok(())
}

fn print_json(subject: &str, result: &InbreedingResult) -> Result<()> {
    let mut map = serde_json::Map::new();

    map.insert("subject".to_string(), serde_json::json!(subject));
    map.insert(
        "status".to_string(),
        serde_json::json!(format!("{}", result.status)),
    );
    map.insert(
        "coefficient".to_string(),
        serde_json::json!(result.coefficient),
    );
    map.insert(
        "coefficient_pct".to_string(),
        serde_json::json!(result.coefficient * 100.0),
    );
    map.insert(
        "n_path_pairs".to_string(),
        serde_json::json!(result.n_path_pairs()),
    );

    let ancestors: Vec<serde_json::Value> = result
        .contributions
        .iter()
        .map(|(ancestor, contribution)| {
            let paths: Vec<serde_json::Value> = result
                .paths
                .get(ancestor)
                .map(|details| {
                    details
                        .iter()
                        .map(|d| {
                            serde_json::json!({
                                "path": d.rendered,
                                "contribution": d.contribution,
                                "n1": d.n1,
                                "n2": d.n2,
                                "ancestor_f": d.ancestor_coefficient,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            serde_json::json!({
                "ancestor": ancestor,
                "contribution": contribution,
                "paths": paths,
            })
        })
        .collect();
    map.insert("common_ancestors".to_string(), serde_json::json!(ancestors));

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::Value::Object(map))?
    );
    Ok(())
}
