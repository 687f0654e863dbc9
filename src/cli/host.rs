//! Host command implementation.

use super::CliError;
use dronefall::{Game, Host, ServerConfig, SessionError};
use std::path::PathBuf;
use tracing::info;

/// Command-line overrides for the server configuration.
#[derive(Debug)]
pub(crate) struct HostOptions {
    pub(crate) config: Option<PathBuf>,
    pub(crate) bind: Option<String>,
    pub(crate) players: Option<usize>,
    pub(crate) locations: Option<usize>,
    pub(crate) seed: Option<u64>,
    pub(crate) deadline: Option<u64>,
}

impl HostOptions {
    /// Load the config file (or defaults) and apply the overrides.
    fn resolve(&self) -> Result<ServerConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.bind.clone_from(bind);
        }
        if let Some(players) = self.players {
            config.players = players;
        }
        if let Some(locations) = self.locations {
            config.game.locations = locations;
        }
        if let Some(seed) = self.seed {
            config.game.seed = seed;
        }
        if self.deadline.is_some() {
            config.phase_deadline_secs = self.deadline;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Execute the host command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the session fails.
pub(crate) fn execute(options: &HostOptions) -> Result<(), CliError> {
    let config = options.resolve()?;
    let roster = config.players;

    let runtime = tokio::runtime::Runtime::new()?;
    let game = runtime.block_on(serve(config, roster))?;

    info!(turn = game.turn(), "host finished");
    println!("Session over after {} turns", game.turn());
    for player in game.players() {
        let status = if game.is_active(player.id) {
            "active"
        } else {
            "out"
        };
        println!(
            "  Player {} ({}): {status}, money {}",
            player.id,
            player.name,
            game.money(player.id)
        );
    }
    Ok(())
}

async fn serve(config: ServerConfig, roster: usize) -> Result<Game, SessionError> {
    let host = Host::start(config).await?;
    println!("Listening on {} for {roster} players", host.local_addr()?);
    host.run_game(roster).await
}
