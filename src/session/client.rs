//! Player-side connection to a host.

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use super::wire::{read_message, write_message, ClientMessage, ServerMessage};
use super::{SessionError, PROTOCOL_VERSION};
use crate::error::Rejection;
use crate::game::{Change, Game, PlayerId};

/// A seated player connection.
#[derive(Debug)]
pub struct Client {
    player: PlayerId,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Connect, say hello, and wait for the seat assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the host does not answer
    /// with a compatible welcome.
    pub async fn connect(addr: impl ToSocketAddrs, name: &str) -> Result<Self, SessionError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let hello = ClientMessage::Hello {
            name: name.to_string(),
        };
        write_message(&mut writer, &hello).await?;

        match read_message::<_, ServerMessage>(&mut reader).await? {
            Some(ServerMessage::Welcome {
                player,
                protocol_version,
            }) if protocol_version == PROTOCOL_VERSION => {
                debug!(player, name, "seated");
                Ok(Self {
                    player,
                    reader,
                    writer,
                })
            }
            Some(other) => Err(SessionError::Unexpected(format!("{other:?}"))),
            None => Err(SessionError::Closed),
        }
    }

    /// The id this connection plays as.
    #[must_use]
    pub const fn player(&self) -> PlayerId {
        self.player
    }

    /// Send a change for the current phase; the reply arrives via [`Self::next_update`].
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be written.
    pub async fn submit_change(&mut self, mut change: Change) -> Result<(), SessionError> {
        change.player = self.player;
        let message = ClientMessage::SubmitChange { change };
        write_message(&mut self.writer, &message).await?;
        Ok(())
    }

    /// Next message from the host, or `None` once it has closed the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding fails.
    pub async fn next_update(&mut self) -> Result<Option<ServerMessage>, SessionError> {
        Ok(read_message(&mut self.reader).await?)
    }

    /// Skip messages until a game snapshot satisfying `ready` arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the host closes first.
    pub async fn wait_for_state(
        &mut self,
        mut ready: impl FnMut(&Game) -> bool,
    ) -> Result<Game, SessionError> {
        loop {
            match self.next_update().await? {
                Some(ServerMessage::GameState { game }) if ready(&game) => return Ok(*game),
                Some(_) => {}
                None => return Err(SessionError::Closed),
            }
        }
    }

    /// Skip snapshots until the host answers the last submitted change.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the host closes first.
    pub async fn wait_for_reply(&mut self) -> Result<Result<(), Rejection>, SessionError> {
        loop {
            match self.next_update().await? {
                Some(ServerMessage::ChangeAccepted) => return Ok(Ok(())),
                Some(ServerMessage::ChangeRejected { reason }) => return Ok(Err(reason)),
                Some(_) => {}
                None => return Err(SessionError::Closed),
            }
        }
    }
}
