//! Session host: owns the canonical game and drives phase progression.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::wire::{encode_line, read_message, write_message, ClientMessage, ServerMessage};
use super::{SessionError, PROTOCOL_VERSION};
use crate::config::ServerConfig;
use crate::game::{Game, Phase, PlayerId};

/// Lines queued for one connection before the host gives up on it.
const OUTBOX_CAPACITY: usize = 64;

/// Longest a single write may block before the connection is dropped.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Sending side of one connection: a bounded line queue and a hang-up switch.
///
/// A client that stops reading fills its queue; the next push flips the
/// switch, which stops both the reader and the writer of that connection.
#[derive(Debug, Clone)]
struct Outbox {
    player: PlayerId,
    lines: mpsc::Sender<Arc<str>>,
    hangup: Arc<watch::Sender<bool>>,
}

impl Outbox {
    fn new(player: PlayerId) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (lines, inbox) = mpsc::channel(OUTBOX_CAPACITY);
        let (hangup, _) = watch::channel(false);
        let outbox = Self {
            player,
            lines,
            hangup: Arc::new(hangup),
        };
        (outbox, inbox)
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.hangup.subscribe()
    }

    /// Queue a line without waiting; hangs up if the queue is full.
    fn push(&self, line: Arc<str>) {
        match self.lines.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(player = self.player, "client is not reading, hanging up");
                self.hang_up();
            }
            // The writer is gone; the reader may still be waiting.
            Err(TrySendError::Closed(_)) => self.hang_up(),
        }
    }

    fn hang_up(&self) {
        let _ = self.hangup.send_replace(true);
    }
}

/// Resolves once the connection's switch is flipped (or the session ends).
async fn hung_up(hangup: &mut watch::Receiver<bool>) {
    let _ = hangup.wait_for(|&down| down).await;
}

/// A connection that has completed the handshake.
struct Seat {
    player: PlayerId,
    name: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Identifies one waiting period for the phase deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PhaseMark {
    turn: u32,
    phase: Phase,
    rotations: usize,
}

impl PhaseMark {
    fn of(game: &Game) -> Self {
        Self {
            turn: game.turn(),
            phase: game.phase(),
            rotations: game.draft().rotations(),
        }
    }
}

/// Game server bound to a TCP socket.
#[derive(Debug)]
pub struct Host {
    listener: TcpListener,
    config: ServerConfig,
}

impl Host {
    /// Bind the configured address.
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails [`ServerConfig::validate`] or
    /// the address cannot be bound.
    pub async fn start(config: ServerConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let listener = TcpListener::bind(&config.bind).await?;
        info!(addr = %listener.local_addr()?, "host listening");
        Ok(Self { listener, config })
    }

    /// Address the host is listening on.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, SessionError> {
        Ok(self.listener.local_addr()?)
    }

    /// Seat `roster` players, then run the game until every connection closes.
    ///
    /// Returns the final canonical game.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting fails or the game cannot be created.
    pub async fn run_game(self, roster: usize) -> Result<Game, SessionError> {
        let seats = self.seat_players(roster).await?;
        let names: Vec<String> = seats.iter().map(|seat| seat.name.clone()).collect();
        let game = Game::new(self.config.game.clone(), &names)?;
        info!(players = names.len(), "roster full, game starting");

        let shared = Arc::new(Mutex::new(game));
        let wake = Arc::new(Notify::new());
        let mut readers = JoinSet::new();
        let mut outboxes: Vec<Outbox> = Vec::with_capacity(seats.len());

        for seat in seats {
            let (outbox, inbox) = Outbox::new(seat.player);
            tokio::spawn(write_loop(seat.player, seat.writer, inbox, outbox.subscribe()));
            readers.spawn(read_loop(
                seat.player,
                seat.reader,
                outbox.clone(),
                Arc::clone(&shared),
                Arc::clone(&wake),
            ));
            outboxes.push(outbox);
        }

        self.progress(&shared, &wake, &mut readers, &outboxes).await;

        let game = shared.lock().await.clone();
        info!(turn = game.turn(), over = game.is_over(), "session closed");
        Ok(game)
    }

    /// Accept connections until `roster` of them have said hello.
    async fn seat_players(&self, roster: usize) -> Result<Vec<Seat>, SessionError> {
        let mut seats: Vec<Seat> = Vec::with_capacity(roster);
        while seats.len() < roster {
            let (stream, addr) = self.listener.accept().await?;
            let (read_half, mut writer) = stream.into_split();
            let mut reader = BufReader::new(read_half);

            let name = match read_message::<_, ClientMessage>(&mut reader).await {
                Ok(Some(ClientMessage::Hello { name })) => name,
                Ok(Some(other)) => {
                    warn!(%addr, message = ?other, "expected hello, dropping connection");
                    continue;
                }
                Ok(None) => {
                    debug!(%addr, "connection closed before hello");
                    continue;
                }
                Err(err) => {
                    warn!(%addr, error = %err, "bad handshake, dropping connection");
                    continue;
                }
            };

            let player = PlayerId::try_from(seats.len() + 1).unwrap_or(PlayerId::MAX);
            let welcome = ServerMessage::Welcome {
                player,
                protocol_version: PROTOCOL_VERSION,
            };
            if let Err(err) = write_message(&mut writer, &welcome).await {
                warn!(%addr, error = %err, "failed to welcome player");
                continue;
            }
            info!(%addr, player, %name, "player seated");
            seats.push(Seat {
                player,
                name,
                reader,
                writer,
            });
        }
        Ok(seats)
    }

    /// Progression loop: broadcast changes, run unit phases, enforce deadlines.
    async fn progress(
        &self,
        shared: &Mutex<Game>,
        wake: &Notify,
        readers: &mut JoinSet<()>,
        outboxes: &[Outbox],
    ) {
        let batch_rounds = self.config.batch_rounds.max(1);
        let deadline = self.config.phase_deadline_secs.map(Duration::from_secs);
        let mut batches = 0u32;
        let mut mark: Option<PhaseMark> = None;
        let mut mark_since = Instant::now();
        let mut announced_over = false;

        loop {
            let mut game = shared.lock().await;

            if game.phase() == Phase::UnitPhase && !game.is_over() {
                let done = game.run_unit_batch(batch_rounds);
                batches += 1;
                if batches == 1 || done {
                    game.take_dirty();
                    broadcast_state(&game, outboxes);
                }
                if done {
                    batches = 0;
                }
                drop(game);
                tokio::task::yield_now().await;
                continue;
            }

            if game.take_dirty() {
                broadcast_state(&game, outboxes);
            }
            if game.is_over() && !announced_over {
                announced_over = true;
                info!(turn = game.turn(), winners = ?game.active_players(), "game over");
            }

            let current = PhaseMark::of(&game);
            if mark != Some(current) {
                mark = Some(current);
                mark_since = Instant::now();
            }
            let expires = deadline
                .filter(|_| !game.awaiting().is_empty() && !game.is_over())
                .map(|limit| mark_since + limit);
            drop(game);

            if readers.is_empty() {
                break;
            }

            tokio::select! {
                () = wake.notified() => {}
                joined = readers.join_next() => {
                    if let Some(Err(err)) = joined {
                        warn!(error = %err, "connection task failed");
                    }
                }
                () = sleep_until_deadline(expires) => {
                    let forfeited = shared.lock().await.forfeit_awaiting();
                    debug!(players = ?forfeited, "forfeited awaiting players");
                }
            }
        }
    }
}

async fn sleep_until_deadline(expires: Option<Instant>) {
    match expires {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn broadcast_state(game: &Game, outboxes: &[Outbox]) {
    let message = ServerMessage::GameState {
        game: Box::new(game.clone()),
    };
    match encode_line(&message) {
        Ok(line) => {
            let line: Arc<str> = Arc::from(line);
            for outbox in outboxes {
                outbox.push(Arc::clone(&line));
            }
            debug!(turn = game.turn(), phase = %game.phase(), "state broadcast");
        }
        Err(err) => warn!(error = %err, "failed to encode game state"),
    }
}

fn send(outbox: &Outbox, message: &ServerMessage) {
    match encode_line(message) {
        Ok(line) => outbox.push(Arc::from(line)),
        Err(err) => warn!(error = %err, "failed to encode reply"),
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    player: PlayerId,
    mut writer: W,
    mut inbox: mpsc::Receiver<Arc<str>>,
    mut hangup: watch::Receiver<bool>,
) {
    loop {
        let line = tokio::select! {
            line = inbox.recv() => line,
            () = hung_up(&mut hangup) => None,
        };
        let Some(line) = line else {
            break;
        };
        let outcome = tokio::select! {
            outcome = timeout(WRITE_TIMEOUT, writer.write_all(line.as_bytes())) => outcome,
            () = hung_up(&mut hangup) => break,
        };
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(player, error = %err, "write failed, stopping writer");
                break;
            }
            Err(_) => {
                warn!(player, "write timed out, stopping writer");
                break;
            }
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop<R: AsyncBufRead + Unpin>(
    player: PlayerId,
    mut reader: R,
    outbox: Outbox,
    shared: Arc<Mutex<Game>>,
    wake: Arc<Notify>,
) {
    let mut hangup = outbox.subscribe();
    loop {
        let message = tokio::select! {
            message = read_message::<_, ClientMessage>(&mut reader) => message,
            () = hung_up(&mut hangup) => {
                info!(player, "host hung up on player");
                break;
            }
        };
        match message {
            Ok(Some(ClientMessage::SubmitChange { mut change })) => {
                change.player = player;
                let outcome = shared.lock().await.apply_change(&change);
                match outcome {
                    Ok(()) => send(&outbox, &ServerMessage::ChangeAccepted),
                    Err(reason) => {
                        debug!(player, %reason, "change rejected");
                        send(&outbox, &ServerMessage::ChangeRejected { reason });
                    }
                }
                wake.notify_one();
            }
            Ok(Some(ClientMessage::Hello { .. })) => {
                debug!(player, "ignoring repeated hello");
            }
            Ok(None) => {
                info!(player, "player disconnected");
                break;
            }
            Err(err) => {
                warn!(player, error = %err, "dropping connection after bad message");
                break;
            }
        }
    }
    outbox.hang_up();
    shared.lock().await.disconnect(player);
    wake.notify_one();
}
