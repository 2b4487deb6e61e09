use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use log::error;

use library_curator::cli::{Cli, Command, DbAction, PlanAction};
use library_curator::domain::LibraryStatistics;
use library_curator::indexer::Indexer;
use library_curator::planner::{
    build_plan, export_plan_json, export_session_csv, group_duplicates_in_library, DeletionPlanner,
};
use library_curator::progress::{CliProgressSink, NoOpProgressSink, ProgressSink};
use library_curator::store::LibraryStore;
use library_curator::utils::config::{get_config, Config};
use library_curator::vetter::Vetter;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!("{err:#}");
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let db_path = resolve_db_path(&cli)?;
    let store = LibraryStore::connect(&db_path).await.context("failed to open the library index")?;

    match cli.command {
        Command::Index { path, force, batch_size } => {
            let root = resolve_root_path(path)?;
            let mut indexer = Indexer::new(&store);
            if let Some(batch_size) = batch_size {
                indexer = indexer.with_batch_size(batch_size);
            }

            let progress = CliProgressSink::new();
            let report = indexer.index_library(&root, force, &progress).await?;

            println!(
                "{} added={} updated={} skipped={} errors={} in {:.2}s",
                "index:".green().bold(),
                report.added,
                report.updated,
                report.skipped,
                report.errors,
                report.duration
            );

            let active = store.get_all_files(true).await?;
            let stats = LibraryStatistics::from_library(&active, report.duration);
            store.save_statistics(&stats).await?;
        }

        Command::Verify => {
            let indexer = Indexer::new(&store);
            let missing = indexer.verify().await?;
            println!("{} {} file(s) marked inactive", "verify:".green().bold(), missing.len());
            for path in &missing {
                println!("  - {path}");
            }
        }

        Command::Vet {
            folder,
            threshold,
            no_fuzzy,
            no_content_hash,
            export_new,
            export_duplicates,
            export_uncertain,
            delete_duplicates,
            dry_run,
            yes,
        } => {
            let vetter = Vetter::new(&store);
            let progress = CliProgressSink::new();

            let report = vetter.vet_folder(&folder, threshold, !no_fuzzy, !no_content_hash, &progress).await?;

            println!(
                "{} {} files scanned: {} duplicates ({:.1}%), {} new ({:.1}%), {} uncertain",
                "vet:".green().bold(),
                report.total_files,
                report.duplicate_count(),
                report.duplicate_percentage(),
                report.new_count(),
                report.new_percentage(),
                report.uncertain_count(),
            );

            if let Some(path) = export_new {
                vetter.export_new_songs(&report, &path)?;
                println!("  wrote new-songs list to {}", path.display());
            }
            if let Some(path) = export_duplicates {
                vetter.export_duplicates(&report, &path)?;
                println!("  wrote duplicates list to {}", path.display());
            }
            if let Some(path) = export_uncertain {
                vetter.export_uncertain(&report, &path)?;
                println!("  wrote uncertain list to {}", path.display());
            }

            if delete_duplicates {
                if report.duplicates.is_empty() {
                    println!("no duplicates to delete");
                } else if !dry_run && !yes && !confirm(&format!("delete {} duplicate file(s)? this cannot be undone", report.duplicate_count()))? {
                    println!("deletion cancelled, no files were touched");
                } else {
                    let delete_progress = CliProgressSink::new();
                    let outcome = vetter.delete_duplicates(&report, dry_run, &delete_progress);
                    println!(
                        "{} {} deleted, {} failed{}",
                        "delete-duplicates:".green().bold(),
                        outcome.deleted,
                        outcome.failed,
                        if dry_run { " (dry run)" } else { "" }
                    );
                    for (path, reason) in &outcome.failures {
                        println!("  - {path}: {reason}");
                    }
                }
            }
        }

        Command::Stats => {
            print_statistics(store.get_statistics().await?);
        }

        Command::History { limit } => {
            let sessions = store.get_vetting_history(limit).await?;
            if sessions.is_empty() {
                println!("no vetting sessions recorded yet");
            }
            for session in sessions {
                println!(
                    "{}  {}  total={} dup={} new={} uncertain={} threshold={:.2}",
                    session.vetted_at.format("%Y-%m-%d %H:%M:%S"),
                    session.import_folder,
                    session.total_files,
                    session.duplicates_found,
                    session.new_songs,
                    session.uncertain_matches,
                    session.threshold_used,
                );
            }
        }

        Command::Plan { action } => match action {
            PlanAction::Build { output } => {
                let (plan, validations) = build_plan_from_store(&store, true).await?;
                print_plan_summary(&plan, &validations);

                if let Some(path) = output {
                    let json = export_plan_json(&plan, &validations)?;
                    std::fs::write(&path, json)?;
                    println!("wrote plan snapshot to {}", path.display());
                }
            }

            PlanAction::Execute { dry_run, backup_root, yes, report } => {
                let (plan, validations) = build_plan_from_store(&store, dry_run).await?;
                print_plan_summary(&plan, &validations);

                if plan.groups.is_empty() {
                    println!("nothing to do");
                    return Ok(());
                }

                if !dry_run && !yes && !confirm("proceed with this deletion plan?")? {
                    println!("aborted, no files were touched");
                    return Ok(());
                }

                let backup_root = resolve_backup_root(backup_root)?;
                let planner = DeletionPlanner::new(&validations);
                let sink: Box<dyn ProgressSink> = if dry_run { Box::new(NoOpProgressSink) } else { Box::new(CliProgressSink::new()) };

                let stats = planner.execute(&plan, &backup_root, sink.as_ref(), || false)?;

                println!(
                    "{} {}/{} groups succeeded, {} files deleted, {} bytes freed{}",
                    "plan execute:".green().bold(),
                    stats.groups_succeeded,
                    stats.groups_total,
                    stats.files_deleted,
                    stats.bytes_freed,
                    if dry_run { " (dry run)" } else { "" }
                );

                if let Some(path) = report {
                    let csv = export_session_csv(&plan, &stats);
                    std::fs::write(&path, csv)?;
                    println!("wrote session report to {}", path.display());
                }
            }
        },

        Command::Db { action } => match action {
            DbAction::VerifyIntegrity => {
                let ok = store.verify_database_integrity().await?;
                if ok {
                    println!("{}", "index integrity: ok".green());
                } else {
                    println!("{}", "index integrity: FAILED".red().bold());
                    std::process::exit(1);
                }
            }
            DbAction::Vacuum => {
                store.optimize_database().await?;
                println!("vacuum complete");
            }
            DbAction::Backup { destination } => {
                store.backup_database(&destination).await?;
                println!("backed up index to {}", destination.display());
            }
        },
    }

    Ok(())
}

fn resolve_db_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(path) = &cli.db {
        return Ok(path.clone());
    }
    Ok(get_config().map(|c: &Config| c.database.path.clone()).unwrap_or_else(|_| PathBuf::from("library.db")))
}

fn resolve_root_path(path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = path {
        return Ok(path);
    }
    get_config()
        .map(|c| c.library.root_path.clone())
        .map_err(|e| anyhow!("no directory given and config.toml is unavailable: {e}"))
}

fn resolve_backup_root(path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = path {
        return Ok(path);
    }
    get_config()
        .map(|c| c.library.backup_root.clone())
        .map_err(|e| anyhow!("no --backup-root given and config.toml is unavailable: {e}"))
}

async fn build_plan_from_store(
    store: &LibraryStore,
    dry_run: bool,
) -> Result<(library_curator::domain::DeletionPlan, Vec<Vec<library_curator::domain::ValidationResult>>)> {
    let files = store.get_all_files(true).await?;
    let groups = group_duplicates_in_library(&files);
    Ok(build_plan(groups, dry_run))
}

fn print_plan_summary(plan: &library_curator::domain::DeletionPlan, validations: &[Vec<library_curator::domain::ValidationResult>]) {
    println!(
        "{} {} group(s), {} file(s) to delete, {:.1} MB reclaimable",
        "plan:".green().bold(),
        plan.groups.len(),
        plan.total_deletes(),
        plan.total_bytes_reclaimed() as f64 / (1024.0 * 1024.0)
    );

    for (group, results) in plan.groups.iter().zip(validations) {
        let blocked = results.iter().any(|r| r.is_blocking());
        let marker = if blocked { "BLOCKED".red().bold() } else { "ok".green() };
        println!("  [{marker}] {} keep={} delete={}", group.group_id, group.keeper.display_name(), group.deletes.len());
        for result in results {
            println!("      - {:?}/{}: {}", result.level, result.checkpoint, result.message);
        }
    }
}

fn print_statistics(stats: Option<LibraryStatistics>) {
    let Some(stats) = stats else {
        println!("no statistics recorded yet; run `index` first");
        return;
    };

    println!("{}", "library statistics".green().bold());
    println!("  total files   : {}", stats.total_files);
    println!("  total size    : {:.2} GB", stats.total_size_gb());
    println!("  avg file size : {:.2} MB", stats.average_file_size_mb());
    println!("  artists       : {}", stats.artists_count);
    println!("  albums        : {}", stats.albums_count);
    println!("  last indexed  : {}", stats.last_index_time.format("%Y-%m-%d %H:%M:%S"));
    for (format, count) in &stats.formats_breakdown {
        println!("    {format:<6} {count}");
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
