//! addonpack command-line interface
//!
//! Operates on a project file holding addons and their drawables.
//!
//! # Examples
//!
//! ```bash
//! # Start a project and import a folder's worth of drawables
//! addonpack --project outfits.json init
//! addonpack --project outfits.json import --sex female mods/*.ydd
//!
//! # Place a file whose type could not be guessed
//! addonpack --project outfits.json add --type-name p_head --sex female mods/my_hat.ydd
//!
//! # Re-pack everything into as few addons as possible
//! addonpack --project outfits.json recalculate
//! ```

use addonpack::allocation::{
    AllocationManager, DeleteScope, DrawableId, LoadPolicy, PartitionKey, Sex,
};
use addonpack::project::{load_project, save_project};
use addonpack::AllocatorConfig;
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// addonpack - addon allocation for clothing and prop drawables
#[derive(Parser, Debug)]
#[command(name = "addonpack")]
#[command(version = addonpack::VERSION)]
#[command(about = "Allocate clothing and prop drawables into addons", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project file path
    #[arg(
        long,
        global = true,
        default_value = "addonpack.json",
        env = "ADDONPACK_PROJECT"
    )]
    project: PathBuf,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "ADDONPACK_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "ADDONPACK_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty project
    Init {
        /// Overwrite an existing project
        #[arg(short, long)]
        force: bool,
    },

    /// Classify and place drawable files
    Import(ImportArgs),

    /// Place a drawable file with an explicit type
    Add(AddArgs),

    /// Reserve an empty slot
    Reserve(KeyArgs),

    /// Move a drawable into another addon
    Move {
        /// Drawable id
        id: DrawableId,
        /// Target addon number (1-based)
        #[arg(long)]
        to: usize,
    },

    /// Delete drawables
    Delete(DeleteArgs),

    /// Re-pack all drawables into the fewest addons
    Recalculate,

    /// Show addons and partition usage
    Status,

    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Drawable files
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[arg(long, default_value = "male")]
    sex: Sex,
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Type name, e.g. jbib or p_head
    #[arg(long)]
    type_name: String,

    #[arg(long, default_value = "male")]
    sex: Sex,
}

impl KeyArgs {
    fn key(&self) -> anyhow::Result<PartitionKey> {
        PartitionKey::from_type_name(self.sex, &self.type_name)
            .with_context(|| format!("Unknown drawable type: {}", self.type_name))
    }
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Drawable file
    path: PathBuf,

    #[command(flatten)]
    key: KeyArgs,

    /// Skin variant (components only)
    #[arg(long)]
    skin: bool,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    /// Drawable ids
    #[arg(required = true)]
    ids: Vec<DrawableId>,

    /// Delete across every addon instead of one
    #[arg(long, conflicts_with = "addon")]
    all_addons: bool,

    /// Addon number (1-based) to delete from
    #[arg(long, default_value = "1")]
    addon: usize,

    /// Also delete the backing files
    #[arg(long)]
    delete_files: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    let config = AllocatorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { force } => init_command(&cli.project, config, force),
        Commands::Import(args) => import_command(&cli.project, config, args),
        Commands::Add(args) => add_command(&cli.project, config, args),
        Commands::Reserve(args) => reserve_command(&cli.project, config, args),
        Commands::Move { id, to } => move_command(&cli.project, config, id, to),
        Commands::Delete(args) => delete_command(&cli.project, config, args),
        Commands::Recalculate => recalculate_command(&cli.project, config),
        Commands::Status => status_command(&cli.project, config),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "addonpack.log");

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color)
                .compact(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

fn open(project: &Path, config: AllocatorConfig) -> anyhow::Result<AllocationManager> {
    load_project(project, config)
        .with_context(|| format!("Failed to open project {}", project.display()))
}

fn addon_index(manager: &AllocationManager, number: usize) -> anyhow::Result<usize> {
    if number == 0 || number > manager.addons().len() {
        bail!(
            "Addon {} does not exist (project has {})",
            number,
            manager.addons().len()
        );
    }
    Ok(number - 1)
}

fn init_command(project: &Path, config: AllocatorConfig, force: bool) -> anyhow::Result<()> {
    if project.exists() && !force {
        bail!("{} already exists, use --force to overwrite", project.display());
    }
    save_project(&AllocationManager::new(config), project)?;
    println!("Created {}", project.display());
    Ok(())
}

fn import_command(project: &Path, config: AllocatorConfig, args: ImportArgs) -> anyhow::Result<()> {
    let mut manager = open(project, config)?;
    let report = manager.add_drawables(&args.paths, args.sex, LoadPolicy::OnDemand);
    save_project(&manager, project)?;

    for placement in &report.placed {
        if let Some((_, drawable)) = manager.find(placement.id) {
            println!(
                "{}  Addon {}  {}",
                placement.id,
                placement.addon + 1,
                drawable.name()
            );
        }
    }
    for path in &report.unresolved {
        warn!(path = %path.display(), "Could not determine drawable type, use `add --type-name`");
        println!("unresolved  {}", path.display());
    }
    Ok(())
}

fn add_command(project: &Path, config: AllocatorConfig, args: AddArgs) -> anyhow::Result<()> {
    let mut manager = open(project, config)?;
    let key = args.key.key()?;
    let placement = manager.add_classified(args.path, key, args.skin, LoadPolicy::OnDemand);
    save_project(&manager, project)?;
    println!(
        "{}  Addon {}  number {}",
        placement.id,
        placement.addon + 1,
        placement.number
    );
    Ok(())
}

fn reserve_command(project: &Path, config: AllocatorConfig, args: KeyArgs) -> anyhow::Result<()> {
    let mut manager = open(project, config)?;
    let placement = manager.reserve_slot(args.key()?);
    save_project(&manager, project)?;
    println!(
        "{}  Addon {}  reserved number {}",
        placement.id,
        placement.addon + 1,
        placement.number
    );
    Ok(())
}

fn move_command(
    project: &Path,
    config: AllocatorConfig,
    id: DrawableId,
    to: usize,
) -> anyhow::Result<()> {
    let mut manager = open(project, config)?;
    let target = addon_index(&manager, to)?;
    let placement = manager.move_drawable(id, target)?;
    save_project(&manager, project)?;
    println!("{}  Addon {}  number {}", id, to, placement.number);
    Ok(())
}

fn delete_command(project: &Path, config: AllocatorConfig, args: DeleteArgs) -> anyhow::Result<()> {
    let mut manager = open(project, config)?;
    let scope = if args.all_addons {
        DeleteScope::AllAddons
    } else {
        let index = addon_index(&manager, args.addon)?;
        manager.select_addon(index)?;
        DeleteScope::SelectedAddon
    };

    let report = manager.delete_drawables(&args.ids, scope, args.delete_files);
    save_project(&manager, project)?;

    println!(
        "Removed {} drawable(s), skipped {}, pruned {} addon(s)",
        report.removed.len(),
        report.skipped.len(),
        report.pruned_addons
    );
    for (path, error) in &report.file_failures {
        println!("could not delete {}: {}", path.display(), error);
    }
    Ok(())
}

fn recalculate_command(project: &Path, config: AllocatorConfig) -> anyhow::Result<()> {
    let mut manager = open(project, config)?;
    let before = manager.addons().len();
    manager.recalculate();
    save_project(&manager, project)?;
    info!(before, after = manager.addons().len(), "Recalculation saved");
    println!("{} addon(s) -> {} addon(s)", before, manager.addons().len());
    Ok(())
}

fn status_command(project: &Path, config: AllocatorConfig) -> anyhow::Result<()> {
    let manager = open(project, config)?;
    println!(
        "{} drawable(s) in {} addon(s)",
        manager.total_count(),
        manager.addons().len()
    );
    for addon in manager.addons() {
        println!("{} ({} drawables)", addon.name(), addon.len());
        for (key, count) in addon.partitions() {
            println!("  {:<32} {:>3}/{}", key.to_string(), count, addon.capacity());
        }
    }
    for violation in manager.validate() {
        println!("! {}", violation);
    }
    Ok(())
}
