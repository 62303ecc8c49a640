//! Command-line front end for depotkeep.

mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use depotkeep_core::config::AppConfig;
use depotkeep_core::{DepotNames, ItemId, ResolveMode, UnlockScript, extract_depot_keys};
use depotkeep_engine::{InstallRequest, Reconciler};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "depotkeepctl")]
#[command(about = "Install and remove unlock packages for a local game client")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "DEPOTKEEP_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install an item from an unlock script
    Install(InstallArgs),
    /// Remove an item and its dependents from every store
    Uninstall {
        #[arg(value_parser = parse_item_id)]
        id: ItemId,
    },
    /// Show which stores reference an item
    Inspect {
        #[arg(value_parser = parse_item_id)]
        id: ItemId,
    },
    /// List installed items
    List,
    /// Slot store commands
    Slots {
        #[command(subcommand)]
        command: SlotCommands,
    },
    /// Print depot keys from a script, or the key store when no script is given
    Keys {
        script: Option<PathBuf>,
    },
    /// Print the dependent set of an item
    Resolve {
        #[arg(value_parser = parse_item_id)]
        id: ItemId,

        /// Override the configured resolve mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args)]
struct InstallArgs {
    /// Unlock script (.lua)
    script: PathBuf,

    /// Primary item id (default: first id in the script without a key)
    #[arg(long, value_parser = parse_item_id)]
    item: Option<ItemId>,

    /// Install only these depots (repeatable)
    #[arg(long = "depot", value_parser = parse_item_id, value_delimiter = ',')]
    depots: Vec<ItemId>,

    /// Display name for the manifest record
    #[arg(long)]
    name: Option<String>,

    /// Install directory name for the manifest record
    #[arg(long)]
    install_dir: Option<String>,

    /// Library that receives the manifest record
    #[arg(long)]
    library: Option<PathBuf>,

    /// Directory holding depot manifest files to copy into the depot cache
    #[arg(long)]
    manifests: Option<PathBuf>,

    /// Only report slot capacity for the request
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum SlotCommands {
    /// List occupied slots
    List,
    /// Print used and free slot counts
    Count,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Fallback,
    Complete,
}

impl From<ModeArg> for ResolveMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fallback => ResolveMode::Fallback,
            ModeArg::Complete => ResolveMode::Complete,
        }
    }
}

fn parse_item_id(value: &str) -> std::result::Result<ItemId, String> {
    ItemId::new(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { config, command } = Cli::parse();
    let config_path = config_path(config.as_deref())?;

    if let Commands::Config { command } = command {
        return handle_config_command(command, &config_path).await;
    }

    let config = load_config(&config_path).await?;
    let names = load_depot_names(&config).await;

    match command {
        Commands::Install(args) => handle_install_command(args, &config, &names).await,
        Commands::Uninstall { id } => handle_uninstall_command(&id, &config).await,
        Commands::Inspect { id } => {
            let engine = reconciler(&config)?;
            let presence = engine.inspect(&id).await?;
            output::print_presence(&presence, &names);
            Ok(())
        }
        Commands::List => {
            let engine = reconciler(&config)?;
            output::print_installed(&engine.installed().await?);
            Ok(())
        }
        Commands::Slots { command } => handle_slots_command(command, &config, &names).await,
        Commands::Keys { script } => handle_keys_command(script.as_deref(), &config, &names).await,
        Commands::Resolve { id, mode } => {
            let engine = reconciler(&config)?;
            let resolver = engine.resolver();
            let mode = mode.map(ResolveMode::from).unwrap_or(resolver.mode());
            let set = resolver.resolve_with_mode(&id, mode).await?;
            output::print_dependent_set(&set, &names);
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn reconciler(config: &AppConfig) -> Result<Reconciler> {
    Reconciler::from_config(config).context("invalid configuration")
}

async fn read_script(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read unlock script {}", path.display()))
}

async fn handle_install_command(
    args: InstallArgs,
    config: &AppConfig,
    names: &DepotNames,
) -> Result<()> {
    let engine = reconciler(config)?;
    let script = UnlockScript::parse(&read_script(&args.script).await?);

    let stem = args
        .script
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| ItemId::new(stem).ok());
    let mut request = InstallRequest::from_script_or(&script, args.item, stem)?;
    if !args.depots.is_empty() {
        request = request.with_selection(args.depots);
    }
    if let Some(name) = args.name {
        request = request.with_name(name);
    }
    if let Some(dir) = args.install_dir {
        request = request.with_install_dir(dir);
    }
    if let Some(library) = args.library {
        request = request.with_library(library);
    }
    if let Some(dir) = args.manifests {
        request = request.with_depot_manifests(dir);
    }

    let selected = request.selected()?;
    let plan = engine.plan(&request.item, &selected).await?;
    if args.dry_run {
        output::print_plan(&request.item, &plan);
        return Ok(());
    }

    let report = match engine.install(&request).await {
        Ok(report) => report,
        Err(e) if e.is_capacity() => {
            output::print_plan(&request.item, &plan);
            anyhow::bail!(
                "not enough free slots: {} free, at most {} dependents fit next to the item",
                plan.remaining,
                plan.max_dependents
            );
        }
        Err(e) => return Err(e.into()),
    };

    output::print_install_report(&report, names);
    if !report.is_success() {
        anyhow::bail!(
            "install of {} finished with {} failed step(s)",
            report.item,
            report.failures().len()
        );
    }
    Ok(())
}

async fn handle_uninstall_command(id: &ItemId, config: &AppConfig) -> Result<()> {
    let engine = reconciler(config)?;
    let report = engine.uninstall(id).await;
    output::print_uninstall_report(&report);
    if !report.is_success() {
        anyhow::bail!(
            "uninstall of {id} finished with {} failed step(s)",
            report.failures().len()
        );
    }
    Ok(())
}

async fn handle_slots_command(
    command: SlotCommands,
    config: &AppConfig,
    names: &DepotNames,
) -> Result<()> {
    let slots = depotkeep_storage::slot_store_from_config(&config.client);
    match command {
        SlotCommands::List => {
            let entries = slots.list().await?;
            let count = slots.count().await?;
            output::print_slots(&entries, count, slots.capacity(), names);
        }
        SlotCommands::Count => {
            let count = slots.count().await?;
            println!("Used: {count}");
            println!("Free: {}", slots.capacity().saturating_sub(count));
            println!("Capacity: {}", slots.capacity());
        }
    }
    Ok(())
}

async fn handle_keys_command(
    script: Option<&Path>,
    config: &AppConfig,
    names: &DepotNames,
) -> Result<()> {
    match script {
        Some(path) => {
            let keys = extract_depot_keys(&read_script(path).await?);
            output::print_keys(&keys, names);
        }
        None => {
            let store = depotkeep_storage::KeyStoreFile::new(config.client.key_store_path());
            let records = store
                .records()
                .await
                .with_context(|| format!("failed to read {}", store.path().display()))?;
            if records.is_empty() {
                println!("No key records in {}.", store.path().display());
            }
            output::print_key_records(&records);
        }
    }
    Ok(())
}

async fn handle_config_command(command: ConfigCommands, path: &Path) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = load_config(path).await?;
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
            save_config(path, &AppConfig::default()).await?;
            println!("Config written to: {}", path.display());
        }
    }
    Ok(())
}

fn config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = std::env::var_os("DEPOTKEEP_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(path) => PathBuf::from(path),
        None => {
            let home = std::env::var_os("HOME")
                .ok_or_else(|| anyhow::anyhow!("HOME not set; set DEPOTKEEP_CONFIG"))?;
            PathBuf::from(home).join(".config")
        }
    };

    Ok(base.join("depotkeep").join("config.toml"))
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("DEPOTKEEP_").split("__"));

    match figment.extract() {
        Ok(config) => Ok(config),
        Err(_) if !path.exists() => Ok(AppConfig::default()),
        Err(err) => Err(anyhow::anyhow!(err).context("failed to load configuration")),
    }
}

async fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = toml::to_string_pretty(config)?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

async fn load_depot_names(config: &AppConfig) -> DepotNames {
    let Some(path) = &config.catalog.depot_names else {
        return DepotNames::default();
    };
    match tokio::fs::read_to_string(path).await {
        Ok(text) => DepotNames::parse(&text),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "depot name catalog unreadable");
            DepotNames::default()
        }
    }
}
