use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use db_backup_tool::config::{self, CloudType, Config};
use db_backup_tool::engines::{keys, BackendContext, BackendRegistry, BackupArtifact, BackupConfig, EngineKind};
use db_backup_tool::managers::logging::{init_logging, LoggingConfig};
use db_backup_tool::managers::notification::NotificationManager;
use db_backup_tool::managers::orchestrator::Orchestrator;
use db_backup_tool::storage::{
    ArtifactUploader, LocalObjectStore, ObjectStore, S3ObjectStore, S3Settings, UploadDestination,
};
use db_backup_tool::utils::RealExecutor;
use db_backup_tool::BackupError;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "db-backup-tool")]
#[command(about = "Backup and restore MySQL, PostgreSQL and MongoDB databases", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "backup-config.toml")]
    config: PathBuf,

    /// Database type (overrides database.type)
    #[arg(short = 't', long = "type")]
    db_type: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Artifact location overrides
#[derive(Args, Clone, Debug, Default)]
struct ArtifactArgs {
    /// Dump file (MySQL, PostgreSQL)
    #[arg(long)]
    backup_file: Option<PathBuf>,

    /// Dump directory (MongoDB)
    #[arg(long)]
    backup_path: Option<PathBuf>,
}

impl ArtifactArgs {
    fn apply(&self, mut params: BackupConfig) -> BackupConfig {
        if let Some(ref file) = self.backup_file {
            params = params.with(keys::BACKUP_FILE, file.to_string_lossy());
        }
        if let Some(ref path) = self.backup_path {
            params = params.with(keys::BACKUP_PATH, path.to_string_lossy());
        }
        params
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full backup of the configured database
    Backup {
        #[command(flatten)]
        artifact: ArtifactArgs,

        /// Upload the artifact to the configured storage afterwards
        #[arg(long)]
        upload: bool,
    },

    /// Restore the configured database from a backup
    Restore {
        #[command(flatten)]
        artifact: ArtifactArgs,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Upload an existing backup to the configured storage
    Upload {
        #[command(flatten)]
        artifact: ArtifactArgs,
    },

    /// Validate configuration, parameters and tool availability
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Process exit code for an error: the backup error's code, otherwise 1
fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<BackupError>()
        .map(BackupError::exit_code)
        .unwrap_or(1)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    // Must stay alive until exit so buffered file logs are flushed
    let _log_guard = init_logging(&LoggingConfig::from_config(&config.logging))?;

    let engine = config
        .engine()
        .context("database.type does not name a supported engine")?;

    let context = BackendContext::new(Arc::new(RealExecutor::new()))
        .with_timeout(config.tools.timeout())
        .with_tools(config.tools.tool_paths())
        .with_policy(config::artifact_policy(&config));

    let mut orchestrator = Orchestrator::new(BackendRegistry::new(context));
    if !config.notification.slack_webhook_url.trim().is_empty() {
        orchestrator =
            orchestrator.with_notification_manager(NotificationManager::new(config.notification.clone()));
    }

    let base = config.backup_config(engine);

    match cli.command {
        Commands::Backup { artifact, upload } => {
            let params = artifact.apply(base);

            if upload {
                if let Some(store) = build_store(&config)? {
                    orchestrator = orchestrator.with_uploader(ArtifactUploader::new(store));
                }
                let receipt = orchestrator.run_backup_and_upload(
                    engine.as_str(),
                    &params,
                    &upload_destination(&config),
                )?;
                println!(
                    "✓ Backup uploaded to {}/{} ({} bytes)",
                    receipt.target.bucket, receipt.target.key, receipt.bytes
                );
            } else {
                let artifact = orchestrator.run_backup(engine.as_str(), &params)?;
                println!("✓ Backup written to {}", artifact.path().display());
            }
        }

        Commands::Restore { artifact, yes } => {
            use dialoguer::Confirm;

            let params = artifact.apply(base);
            let location = orchestrator
                .registry()
                .resolve_kind(engine)?
                .artifact_location(&params)?;

            if !yes {
                let confirm = Confirm::new()
                    .with_prompt(format!(
                        "Restore database '{}' from {}? Existing data may be overwritten",
                        config.database.dbname,
                        location.path().display()
                    ))
                    .default(false)
                    .interact()?;

                if !confirm {
                    println!("Restore cancelled.");
                    return Ok(());
                }
            }

            orchestrator.run_restore(engine.as_str(), &params)?;
            println!("✓ Restore completed successfully");
        }

        Commands::Upload { artifact } => {
            let params = artifact.apply(base);
            let location = orchestrator
                .registry()
                .resolve_kind(engine)?
                .artifact_location(&params)?;
            let artifact = BackupArtifact::new(engine, config.database.dbname.clone(), location);

            if let Some(store) = build_store(&config)? {
                orchestrator = orchestrator.with_uploader(ArtifactUploader::new(store));
            }
            let receipt = orchestrator.upload_existing(&artifact, &upload_destination(&config))?;
            println!(
                "✓ Uploaded {} to {}/{} ({} bytes)",
                receipt.source.display(),
                receipt.target.bucket,
                receipt.target.key,
                receipt.bytes
            );
        }

        Commands::Validate => {
            orchestrator.validate(engine.as_str(), &base)?;
            println!("Configuration is valid!");
            println!("Database: {} '{}' on {}", engine, config.database.dbname, config.database.host);

            let missing = check_tools(&config, engine);
            if !missing.is_empty() {
                anyhow::bail!("Required tools not found: {}", missing.join(", "));
            }

            match config.storage.cloud_type {
                Some(cloud) => println!("Uploads: {:?} bucket '{}'", cloud, config.storage.bucket),
                None => println!("Uploads: disabled"),
            }
        }
    }

    Ok(())
}

/// Read the file, overlay environment and `--type`, then validate
fn load_config(cli: &Cli) -> Result<Config> {
    let contents = fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config file: {:?}", cli.config))?;

    let mut config = config::parse_config(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", cli.config))?;
    config::apply_env_overrides(&mut config, std::env::vars())?;

    if let Some(ref db_type) = cli.db_type {
        config.database.db_type = db_type.clone();
    }

    config::validate_config(&config)?;
    Ok(config)
}

fn upload_destination(config: &Config) -> UploadDestination {
    let destination = UploadDestination::new(config.storage.bucket.clone());
    if config.storage.prefix.trim().is_empty() {
        destination
    } else {
        destination.with_prefix(config.storage.prefix.clone())
    }
}

/// Object store for `storage.cloud_type`, if uploads are configured
fn build_store(config: &Config) -> Result<Option<Arc<dyn ObjectStore>>> {
    let storage = &config.storage;
    let store: Arc<dyn ObjectStore> = match storage.cloud_type {
        None => return Ok(None),
        Some(CloudType::S3) => Arc::new(S3ObjectStore::new(&S3Settings {
            region: storage.region.clone(),
            endpoint_url: storage.endpoint_url.clone(),
        })?),
        Some(CloudType::Local) => {
            let root = match storage.local_store_path {
                Some(ref path) => config::expand_tilde(path),
                None => config::backup_root(storage).join("uploads"),
            };
            Arc::new(LocalObjectStore::new(root))
        }
    };
    Ok(Some(store))
}

/// Print tool availability, returning the programs that were not found
fn check_tools(config: &Config, engine: EngineKind) -> Vec<String> {
    let tools = config.tools.tool_paths();
    let (dump, restore) = tools.for_engine(engine);

    let mut missing = Vec::new();
    for program in [dump, restore] {
        match which::which(program) {
            Ok(path) => println!("  ✓ {} ({})", program, path.display()),
            Err(_) => {
                println!("  ✗ {} not found", program);
                missing.push(program.to_string());
            }
        }
    }
    missing
}
