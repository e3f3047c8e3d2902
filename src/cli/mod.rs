use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub mod add;
pub mod delete;
pub mod display;
pub mod list;
pub mod show;

pub use add::run_add;
pub use delete::run_delete;
pub use display::print_full_contact;
pub use list::run_list;
pub use show::run_show;

use crate::config::ManagerConfig;
use crate::engine::{Aggregator, FileAvatarCache, MemoryAggregator};
use crate::manager::Manager;

#[derive(Parser)]
#[command(name = "folks-contacts")]
#[command(about = "Browse aggregated individuals as contacts")]
#[command(version)]
pub struct Cli {
    /// Engine contents to load (JSON)
    #[arg(short, long, global = true)]
    pub fixture: Option<PathBuf>,
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show manager name, URI and capabilities
    Info,
    /// List contacts
    List(ListArgs),
    /// Show full details for a contact
    Show(ShowArgs),
    /// Add a new contact to the primary store
    Add(AddArgs),
    /// Remove a contact
    Delete(ShowArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Sort field: label, first, last, nickname, email, phone, org
    #[arg(short, long)]
    pub sort: Option<String>,
    #[arg(short, long, default_value = "asc")]
    pub order: String,
    /// Only contacts whose name, email or phone contains this text
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Contact id (sql-...) or name
    pub identifier: String,
}

#[derive(Args)]
pub struct AddArgs {
    pub name: String,
    #[arg(short, long)]
    pub email: Option<String>,
    #[arg(short, long)]
    pub phone: Option<String>,
    #[arg(short, long)]
    pub notes: Option<String>,
}

pub fn load_config(path: Option<&Path>) -> Result<ManagerConfig> {
    match path {
        Some(path) => ManagerConfig::load_from(path),
        None => ManagerConfig::load(),
    }
}

/// Build the engine and open a manager over it. Must run inside a `LocalSet`.
pub async fn open_manager(fixture: Option<&Path>, config: ManagerConfig) -> Result<Manager> {
    let cache = Rc::new(FileAvatarCache::new(config.avatar_cache_dir()));
    let engine = match fixture {
        Some(path) => MemoryAggregator::load_fixture(path, cache)?,
        None => MemoryAggregator::new(cache),
    };
    let engine: Rc<dyn Aggregator> = Rc::new(engine);
    Manager::open(engine, config)
        .await
        .context("opening contact manager")
}

pub fn print_info(manager: &Manager) {
    println!("{} v{}", manager.manager_name(), manager.manager_version());
    println!("  uri:        {}", manager.manager_uri());
    println!("  contacts:   {}", manager.contact_count());
    println!("  types:      {:?}", manager.supported_contact_types());
    println!("  data types: {:?}", manager.supported_data_types());
}

pub async fn run(cli: Cli, config: ManagerConfig) -> Result<()> {
    let manager = open_manager(cli.fixture.as_deref(), config).await?;

    match cli.command {
        None | Some(Commands::Info) => print_info(&manager),
        Some(Commands::List(args)) => {
            run_list(&manager, args.sort, args.order, args.search).await?;
        }
        Some(Commands::Show(args)) => run_show(&manager, &args.identifier)?,
        Some(Commands::Add(args)) => {
            run_add(&manager, args.name, args.email, args.phone, args.notes).await?;
            manager.drain_write_backs().await;
        }
        Some(Commands::Delete(args)) => run_delete(&manager, &args.identifier).await?,
    }

    manager.drain_avatar_fetches().await;
    Ok(())
}
