//! `icms-migrate` command surface.
//!
//! Every stage prints its [`StageReport`] as pretty JSON on stdout. Logs go
//! to stderr through the subscriber installed by the binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use icms_migration_core::{DataType, MigrationConfig};
use icms_migration_store_sqlite::{
    Migrator, RunRecord, SqliteLegacySource, SqliteMigrationStore, StageReport,
};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "icms-migrate")]
#[command(about = "ICMS V1 to V2 data migration")]
pub struct Cli {
    /// Target database the staging area and V2 tables live in.
    #[arg(long, env = "ICMS_MIGRATION_DB", default_value = "./icms.sqlite3")]
    db: PathBuf,

    /// Legacy replica, `sqlite://<path>` or a bare path.
    #[arg(long, env = "ICMS_V1_REPLICA_DSN")]
    legacy_dsn: Option<String>,

    #[arg(long, env = "ALLOW_DATA_MIGRATION")]
    allow_data_migration: bool,

    #[arg(long, env = "DATA_MIGRATION_BATCH_SIZE", default_value_t = 2000)]
    batch_size: usize,

    /// Users whose login ends with this domain are left behind.
    #[arg(long, env = "DATA_MIGRATION_EMAIL_DOMAIN_EXCLUDE")]
    email_domain_exclude: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stage legacy rows.
    ExportFromV1(GroupArgs),
    /// Explode staged XML fragments into child rows.
    ExtractV1Xml(GroupArgs),
    /// Load staged rows into the V2 tables, then tasks and checks.
    ImportV1Data(ImportArgs),
    /// Create tasks for in-flight applications.
    CreateTasks,
    /// Compare target counts against the replica.
    Check(GroupArgs),
    /// Export, extract and import in one go.
    Run(ImportArgs),
    /// Empty the staging area and every target table.
    Reset,
    /// List recorded stage runs, newest first.
    Runs,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct GroupArgs {
    #[arg(long)]
    skip_ref: bool,
    #[arg(long)]
    skip_user: bool,
    #[arg(long)]
    skip_ia: bool,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    groups: GroupArgs,
    #[arg(long)]
    skip_task: bool,
}

impl GroupArgs {
    /// Selected groups in load order.
    #[must_use]
    pub fn data_types(self) -> Vec<DataType> {
        DataType::ALL
            .into_iter()
            .filter(|data_type| match data_type {
                DataType::Reference => !self.skip_ref,
                DataType::User => !self.skip_user,
                DataType::ImportApplication => !self.skip_ia,
            })
            .collect()
    }
}

impl Cli {
    #[must_use]
    pub fn config(&self) -> MigrationConfig {
        MigrationConfig {
            allow_data_migration: self.allow_data_migration,
            legacy_dsn: self.legacy_dsn.clone(),
            batch_size: self.batch_size,
            email_domain_exclude: self.email_domain_exclude.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunsPayload {
    runs: Vec<RunRecord>,
}

/// Executes the parsed command.
///
/// # Errors
/// Returns an error when the interlock is off, the legacy replica or target
/// database cannot be opened, or a stage fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let config = cli.config();

    if matches!(cli.command, Command::Runs) {
        let store = open_store(&cli.db)?;
        let payload = RunsPayload {
            runs: store.list_runs()?,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    // Nothing is opened or created until the interlock is on.
    config.validate()?;

    let mut store = open_store(&cli.db)?;
    let source = match cli.command {
        Command::Reset | Command::CreateTasks => None,
        _ => Some(open_legacy(&config)?),
    };

    let mut migrator = Migrator::new(&mut store, &config);
    if let Some(source) = source.as_ref() {
        migrator = migrator.with_source(source);
    }

    let reports: Vec<StageReport> = match cli.command {
        Command::ExportFromV1(args) => vec![migrator.export_from_v1(&args.data_types())?],
        Command::ExtractV1Xml(args) => vec![migrator.extract_v1_xml(&args.data_types())?],
        Command::ImportV1Data(args) => vec![migrator
            .import_v1_data(&args.groups.data_types(), !args.skip_task)?],
        Command::CreateTasks => vec![migrator.create_tasks()?],
        Command::Check(args) => vec![migrator.run_checks(&args.data_types())?],
        Command::Run(args) => {
            let data_types = args.groups.data_types();
            vec![
                migrator.export_from_v1(&data_types)?,
                migrator.extract_v1_xml(&data_types)?,
                migrator.import_v1_data(&data_types, !args.skip_task)?,
            ]
        }
        Command::Reset => vec![migrator.reset()?],
        Command::Runs => Vec::new(),
    };

    print_reports(&reports)
}

fn open_store(db: &Path) -> Result<SqliteMigrationStore> {
    let store = SqliteMigrationStore::open(db)
        .with_context(|| format!("failed to open target database {}", db.display()))?;
    store.migrate()?;
    Ok(store)
}

fn open_legacy(config: &MigrationConfig) -> Result<SqliteLegacySource> {
    let dsn = config.require_legacy_dsn()?;
    SqliteLegacySource::open(&dsn)
}

fn print_reports(reports: &[StageReport]) -> Result<()> {
    match reports {
        [report] => println!("{}", serde_json::to_string_pretty(report)?),
        reports => println!("{}", serde_json::to_string_pretty(reports)?),
    }
    Ok(())
}
