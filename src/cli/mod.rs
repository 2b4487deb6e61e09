//! `clap`-derived command surface (C10, ambient) wiring the Indexer,
//! Vetter, Detector, Quality Scorer and Deletion Planner together behind
//! one binary. Mirrors the reference's `Cli`/`Command` shape
//! (`examples/Ocean50ul-home-server/src/cli/mod.rs`), generalized from one
//! `Fixtures`/`Server` pair of subcommands to this crate's library-curation
//! verbs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::vetter::DEFAULT_THRESHOLD;

#[derive(Parser)]
#[command(name = "library-curator", about = "Music library duplicate detection and curation", version)]
pub struct Cli {
    /// Path to the SQLite index, overriding `database.path` in config.toml.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Walk a directory and reconcile it into the index.
    Index {
        /// Directory to scan. Defaults to `library.root_path` in config.toml.
        path: Option<PathBuf>,

        /// Ignore the mtime/size skip decision and re-tag every file.
        #[arg(long)]
        force: bool,

        /// Rows accumulated before a batch is flushed to the store.
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Soft-delete index entries whose file no longer exists on disk.
    Verify,

    /// Classify every file in an import folder as new, duplicate or uncertain.
    Vet {
        /// Folder of candidate files to check against the index.
        folder: PathBuf,

        /// Fuzzy-metadata similarity threshold in [0.0, 1.0].
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Skip tier 3 (fuzzy title similarity).
        #[arg(long)]
        no_fuzzy: bool,

        /// Skip tier 2 (exact content hash).
        #[arg(long)]
        no_content_hash: bool,

        /// Write one path per line of the new-songs bucket here.
        #[arg(long)]
        export_new: Option<PathBuf>,

        /// Write the duplicates bucket (with match summaries) here.
        #[arg(long)]
        export_duplicates: Option<PathBuf>,

        /// Write the uncertain bucket (with match summaries) here.
        #[arg(long)]
        export_uncertain: Option<PathBuf>,

        /// Delete the import-side files in the duplicates bucket after
        /// vetting. Never touches the uncertain bucket.
        #[arg(long)]
        delete_duplicates: bool,

        /// Simulate `--delete-duplicates`: report what would be removed
        /// without touching disk.
        #[arg(long)]
        dry_run: bool,

        /// Skip the interactive confirmation prompt before deleting.
        #[arg(long)]
        yes: bool,
    },

    /// Print the most recently saved library statistics snapshot.
    Stats,

    /// List recent vetting sessions.
    History {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Group duplicates, validate, and (optionally) execute a deletion plan.
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Store maintenance operations.
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
pub enum PlanAction {
    /// Cluster the active library into duplicate groups and print/export
    /// the validated plan without touching the filesystem.
    Build {
        /// Write the plan's JSON snapshot here.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Re-run `build`, then back up and delete every group that passed
    /// validation.
    Execute {
        /// Simulate the run: validate and count, but never touch disk.
        #[arg(long)]
        dry_run: bool,

        /// Directory under which a timestamped backup subfolder is made.
        /// Defaults to `library.backup_root` in config.toml.
        #[arg(long)]
        backup_root: Option<PathBuf>,

        /// Skip the interactive confirmation prompt.
        #[arg(long)]
        yes: bool,

        /// Write the CSV session report here after execution.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DbAction {
    /// Run `PRAGMA integrity_check` against the index.
    VerifyIntegrity,

    /// Reclaim unused space (`VACUUM`); never run inside a transaction.
    Vacuum,

    /// Snapshot the database file to `destination` via `VACUUM INTO`.
    Backup { destination: PathBuf },
}
