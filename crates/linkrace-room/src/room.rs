//! Room actor: one Tokio task per room that owns its sessions, history and
//! protocol state.
//!
//! Everything that touches a room goes through its command channel, so
//! commands are applied one at a time in arrival order. That single writer
//! is what keeps history order, broadcast order and replay consistent.
//!
//! ## Idle cleanup
//!
//! When the last session leaves, the actor arms a deadline
//! `cleanup_grace` in the future. A connect before the deadline disarms
//! it. When it fires the actor checks again that no session is attached,
//! deletes the persisted history and stops; the manager spawns a fresh
//! actor on the next connect.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use linkrace_protocol::{Codec, JsonCodec, PlayerId, RoomId};
use linkrace_session::{Frame, SessionRegistry, SessionSender};
use linkrace_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::log::{EventLog, history_key};
use crate::{HistoryStore, Outcome, RoomConfig, RoomError, RoomLogic, RoomPhase};

/// Commands sent to a room actor through its channel.
///
/// Variants with a `reply` are request/response; the rest are
/// fire-and-forget.
pub(crate) enum RoomCommand<E> {
    /// Attach a session and replay history to it.
    Connect {
        conn_id: ConnectionId,
        sender: SessionSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Detach a session.
    Disconnect { conn_id: ConnectionId },

    /// An event decoded from a session's socket.
    Inbound { conn_id: ConnectionId, event: E },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    /// Stop without touching persisted history.
    Shutdown,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    /// Protocol phase, for race rooms.
    pub phase: Option<RoomPhase>,
    /// Admitted players, in admission order.
    pub roster: Vec<PlayerId>,
    /// Number of attached sessions.
    pub session_count: usize,
    /// Number of committed events.
    pub history_len: usize,
    /// Whether an idle cleanup deadline is armed.
    pub cleanup_pending: bool,
}

/// Handle to a running room actor.
///
/// Cheap to clone; it wraps an `mpsc::Sender`. Every method fails with
/// [`RoomError::Unavailable`] once the actor has stopped.
pub struct RoomHandle<L: RoomLogic> {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand<L::Event>>,
}

impl<L: RoomLogic> Clone for RoomHandle<L> {
    fn clone(&self) -> Self {
        Self {
            room_id: self.room_id.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<L: RoomLogic> RoomHandle<L> {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }

    /// Attaches a session. Returns once the full history has been queued
    /// on `sender`.
    pub async fn connect(
        &self,
        conn_id: ConnectionId,
        sender: SessionSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Connect {
                conn_id,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Detaches a session (fire-and-forget).
    pub async fn disconnect(&self, conn_id: ConnectionId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Disconnect { conn_id })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Submits an inbound event (fire-and-forget).
    pub async fn submit(&self, conn_id: ConnectionId, event: L::Event) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Inbound { conn_id, event })
            .await
            .map_err(|_| self.unavailable())
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to stop. Persisted history is kept.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

/// Milliseconds since the Unix epoch, used to stamp synthesized events.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<L: RoomLogic, S> {
    room_id: RoomId,
    config: RoomConfig,
    logic: L,
    log: EventLog<L::Event, S>,
    sessions: SessionRegistry,
    codec: JsonCodec,
    cleanup_at: Option<Instant>,
    receiver: mpsc::Receiver<RoomCommand<L::Event>>,
}

/// What the loop should do after a command or timer.
enum Flow {
    Continue,
    Stop,
}

impl<L: RoomLogic, S: HistoryStore> RoomActor<L, S> {
    async fn run(mut self) {
        tracing::info!(
            room_id = %self.room_id,
            namespace = L::NAMESPACE,
            history = self.log.len(),
            "room actor started"
        );

        loop {
            let deadline = self.cleanup_at;
            let flow = tokio::select! {
                biased;

                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => Flow::Stop,
                },
                () = idle_deadline(deadline) => self.run_cleanup().await,
            };
            if let Flow::Stop = flow {
                break;
            }
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    async fn handle_command(&mut self, cmd: RoomCommand<L::Event>) -> Flow {
        match cmd {
            RoomCommand::Connect {
                conn_id,
                sender,
                reply,
            } => {
                let result = self.handle_connect(conn_id, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect { conn_id } => self.handle_disconnect(conn_id),
            RoomCommand::Inbound { conn_id, event } => {
                self.handle_inbound(conn_id, event).await;
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room_id, "room shutting down");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn handle_connect(
        &mut self,
        conn_id: ConnectionId,
        sender: SessionSender,
    ) -> Result<(), RoomError> {
        self.sessions.add(conn_id, sender)?;
        if self.cleanup_at.take().is_some() {
            tracing::info!(room_id = %self.room_id, %conn_id, "idle cleanup cancelled");
        }

        match self.log.replay_to(&self.sessions, conn_id) {
            Ok(replayed) => {
                tracing::info!(
                    room_id = %self.room_id,
                    %conn_id,
                    sessions = self.sessions.count(),
                    replayed,
                    "session connected"
                );
                Ok(())
            }
            Err(e) => {
                let _ = self.sessions.remove(conn_id);
                self.arm_cleanup_if_idle();
                Err(e)
            }
        }
    }

    fn handle_disconnect(&mut self, conn_id: ConnectionId) {
        if let Err(e) = self.sessions.remove(conn_id) {
            tracing::debug!(room_id = %self.room_id, %conn_id, error = %e, "disconnect ignored");
            return;
        }
        tracing::info!(
            room_id = %self.room_id,
            %conn_id,
            sessions = self.sessions.count(),
            "session disconnected"
        );
        self.arm_cleanup_if_idle();
    }

    fn arm_cleanup_if_idle(&mut self) {
        if self.sessions.is_empty() && self.cleanup_at.is_none() {
            self.cleanup_at = Some(Instant::now() + self.config.cleanup_grace);
            tracing::info!(
                room_id = %self.room_id,
                grace_ms = self.config.cleanup_grace.as_millis() as u64,
                "last session left, idle cleanup scheduled"
            );
        }
    }

    async fn handle_inbound(&mut self, conn_id: ConnectionId, event: L::Event) {
        if !self.sessions.contains(conn_id) {
            tracing::warn!(
                room_id = %self.room_id,
                %conn_id,
                "event from detached session, ignoring"
            );
            return;
        }

        let label = L::label(&event);
        let outcomes = self.logic.handle(event, self.log.events(), now_ms());
        tracing::debug!(
            room_id = %self.room_id,
            %conn_id,
            kind = label,
            outcomes = outcomes.len(),
            "event handled"
        );

        for outcome in outcomes {
            match outcome {
                Outcome::Commit(event) => {
                    let label = L::label(&event);
                    match self.log.append(event).await {
                        Ok(committed) => {
                            self.sessions.broadcast(committed.frame());
                            tracing::debug!(
                                room_id = %self.room_id,
                                kind = label,
                                seq = committed.seq(),
                                "event committed"
                            );
                        }
                        Err(e) => {
                            // Nothing after a failed commit may be broadcast.
                            tracing::error!(
                                room_id = %self.room_id,
                                kind = label,
                                error = %e,
                                "commit failed, dropping remaining outcomes"
                            );
                            return;
                        }
                    }
                }
                Outcome::Relay(event) => match self.codec.encode(&event) {
                    Ok(bytes) => {
                        self.sessions.broadcast(&Frame::from(bytes));
                    }
                    Err(e) => {
                        tracing::warn!(room_id = %self.room_id, error = %e, "relay encode failed");
                    }
                },
            }
        }
    }

    async fn run_cleanup(&mut self) -> Flow {
        self.cleanup_at = None;
        if !self.sessions.is_empty() {
            return Flow::Continue;
        }

        match self.log.clear().await {
            Ok(()) => {
                tracing::info!(room_id = %self.room_id, key = self.log.key(), "idle room history deleted");
            }
            Err(e) => {
                tracing::error!(room_id = %self.room_id, error = %e, "idle cleanup failed");
            }
        }
        Flow::Stop
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            phase: self.logic.phase(),
            roster: self.logic.roster(),
            session_count: self.sessions.count(),
            history_len: self.log.len(),
            cleanup_pending: self.cleanup_at.is_some(),
        }
    }
}

async fn idle_deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Spawns a room actor and returns a handle to it.
///
/// The actor loads its history before serving commands. If loading fails
/// it logs the error and stops, and every queued command observes
/// [`RoomError::Unavailable`].
pub(crate) fn spawn_room<L: RoomLogic, S: HistoryStore>(
    room_id: RoomId,
    config: RoomConfig,
    store: Arc<S>,
) -> RoomHandle<L> {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let handle = RoomHandle {
        room_id: room_id.clone(),
        sender: tx,
    };

    tokio::spawn(async move {
        let key = history_key(L::NAMESPACE, &room_id);
        let log = match EventLog::load_or_init(key, store).await {
            Ok(log) => log,
            Err(e) => {
                tracing::error!(room_id = %room_id, error = %e, "room activation failed");
                return;
            }
        };
        let actor = RoomActor {
            room_id,
            config,
            logic: L::new(),
            log,
            sessions: SessionRegistry::new(),
            codec: JsonCodec,
            cleanup_at: None,
            receiver: rx,
        };
        actor.run().await;
    });

    handle
}
