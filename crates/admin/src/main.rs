use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use classdesk_admin::{storage, AdminConfig, Command, Session};
use classdesk_auth::InMemoryGrantStore;
use classdesk_core::UserId;

/// Manage and query scoped permission grants
#[derive(Parser, Debug)]
#[command(name = "classdesk-admin", version, about)]
struct Cli {
    /// Grant snapshot file (overrides CLASSDESK_GRANTS_FILE)
    #[arg(short = 'f', long = "file", global = true)]
    file: Option<PathBuf>,

    /// Acting administrator recorded on grants (overrides CLASSDESK_ACTOR)
    #[arg(long, global = true)]
    actor: Option<UserId>,

    /// Treat expiry timestamps as informational only
    #[arg(long, global = true)]
    no_expiry: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    classdesk_observability::init();

    let cli = Cli::parse();
    let config = AdminConfig::from_env().with_overrides(cli.file, cli.actor, cli.no_expiry);

    let store = InMemoryGrantStore::arc();
    storage::load_into(&config.grants_file, store.as_ref())?;

    let session = Session::new(store, config.policy, config.actor.clone());
    let mutates = cli.command.is_mutation();
    session.execute(cli.command, &mut std::io::stdout().lock())?;

    if mutates {
        storage::save(&config.grants_file, session.store().as_ref())?;
    }
    Ok(())
}
