//! Room actor: one Tokio task that owns a room's members, chat log and,
//! for game rooms, paddles.
//!
//! Nothing outside the actor touches that state. Connections talk to it
//! through a bounded mailbox ([`RoomHandle`]) and hear back through their
//! own bounded outbound queue. The bullet board is the one exception; see
//! [`crate::game`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use huddle_protocol::{
    ChatMessage, ClientFrame, ClientId, GameSnapshot, GameView, Member, PlayerSlot, Point,
    RoomId, ServerFrame, SignalFrame,
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{Admission, ClientHandle, Outbound, Ticket};
use crate::game::{BulletBoard, Paddles, SharedBoard, SimEvent, run_simulation};
use crate::registry::Shared;
use crate::{ChatStore, RoomConfig, RoomError, RoomKind};

/// Commands sent to a room actor through its mailbox.
pub(crate) enum RoomCommand {
    /// Admit a client. The reply carries its ticket and slot.
    Register {
        client: ClientHandle,
        reply: oneshot::Sender<Result<Admission, RoomError>>,
    },

    /// Drop a client. Ignored unless `ticket` is the client's current one.
    Unregister { client_id: ClientId, ticket: Ticket },

    /// A decoded frame from a member's connection.
    Frame {
        client_id: ClientId,
        ticket: Ticket,
        frame: ClientFrame,
    },

    /// Report current membership and counters.
    Info { reply: oneshot::Sender<RoomInfo> },
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub kind: RoomKind,
    /// Current members in join order.
    pub members: Vec<Member>,
    pub history_len: usize,
    /// Live bullets (always 0 for chat rooms).
    pub bullets: usize,
}

/// Handle to a running room actor.
///
/// Cheap to clone. The registry holds one per room; connections hold one
/// each for the lifetime of their membership.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    kind: RoomKind,
    generation: u64,
    sender: mpsc::Sender<RoomCommand>,
    members: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    /// Distinguishes this actor from earlier or later rooms with the same id.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Membership as last published by the actor.
    pub fn member_count(&self) -> usize {
        self.members.load(Ordering::Acquire)
    }

    /// Whether the actor has stopped taking commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Asks the room to admit `client`.
    ///
    /// On success the client's snapshot is already on its outbound queue.
    ///
    /// # Errors
    /// - `RoomError::RoomFull` for a third player in a game room.
    /// - `RoomError::Unavailable` if the room was reclaimed meanwhile;
    ///   resolve the id again and retry.
    pub async fn register(&self, client: ClientHandle) -> Result<Admission, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Register {
            client,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Tells the room a connection is gone. Safe to call more than once.
    pub async fn unregister(&self, client_id: ClientId, ticket: Ticket) -> Result<(), RoomError> {
        self.send(RoomCommand::Unregister { client_id, ticket }).await
    }

    /// Forwards a decoded frame from a member's connection.
    pub async fn dispatch(
        &self,
        client_id: ClientId,
        ticket: Ticket,
        frame: ClientFrame,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Frame {
            client_id,
            ticket,
            frame,
        })
        .await
    }

    /// Requests the current room info.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Info { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }
}

/// A member as the actor tracks it.
struct MemberEntry {
    client: ClientHandle,
    ticket: Ticket,
    slot: Option<PlayerSlot>,
}

/// Game-room state owned by the actor, plus its link to the simulation.
struct GameRoom {
    paddles: Paddles,
    ball: Point,
    paddle_tx: watch::Sender<Paddles>,
    board: SharedBoard,
    sim_events: mpsc::Receiver<Vec<SimEvent>>,
    sim_task: JoinHandle<()>,
}

impl Drop for GameRoom {
    fn drop(&mut self) {
        self.sim_task.abort();
    }
}

enum Event {
    Command(RoomCommand),
    Simulated(Vec<SimEvent>),
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<S: ChatStore> {
    room_id: RoomId,
    kind: RoomKind,
    generation: u64,
    members: HashMap<ClientId, MemberEntry>,
    history: Vec<ChatMessage>,
    next_ticket: u64,
    member_gauge: Arc<AtomicUsize>,
    /// Members whose queue refused a frame, pending removal.
    evictions: VecDeque<(ClientId, &'static str)>,
    /// Set when a member left during the current command.
    departed: bool,
    game: Option<GameRoom>,
    store: Arc<S>,
    registry: Weak<Shared<S>>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<S: ChatStore> RoomActor<S> {
    async fn run(mut self) {
        info!(room_id = %self.room_id, kind = %self.kind, generation = self.generation, "room started");

        match self.store.load(&self.room_id).await {
            Ok(history) => self.history = history,
            Err(e) => warn!(room_id = %self.room_id, error = %e, "failed to load chat history"),
        }

        loop {
            let event = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Event::Command(cmd),
                    None => break,
                },
                Some(batch) = next_sim_batch(&mut self.game) => Event::Simulated(batch),
            };

            match event {
                Event::Command(cmd) => self.handle_command(cmd).await,
                Event::Simulated(batch) => self.handle_simulated(batch),
            }

            self.settle_evictions();

            if self.departed && self.members.is_empty() && self.release().await {
                self.refuse_pending().await;
                break;
            }
            self.departed = false;
        }

        info!(room_id = %self.room_id, generation = self.generation, "room stopped");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Register { client, reply } => {
                let result = self.handle_register(client).await;
                let _ = reply.send(result);
            }
            RoomCommand::Unregister { client_id, ticket } => {
                self.handle_unregister(&client_id, ticket);
            }
            RoomCommand::Frame {
                client_id,
                ticket,
                frame,
            } => {
                let Some(slot) = self.current_member(&client_id, ticket) else {
                    debug!(
                        room_id = %self.room_id,
                        %client_id,
                        %ticket,
                        frame = frame.kind(),
                        "frame from stale or departed connection, ignoring"
                    );
                    return;
                };
                self.handle_frame(client_id, slot, frame).await;
            }
            RoomCommand::Info { reply } => {
                let info = self.info().await;
                let _ = reply.send(info);
            }
        }
    }

    // -- membership -------------------------------------------------------

    async fn handle_register(&mut self, client: ClientHandle) -> Result<Admission, RoomError> {
        let client_id = client.id().clone();
        let ticket = self.issue_ticket();

        if let Some(entry) = self.members.get_mut(&client_id) {
            // Same identity again: the new connection takes over silently.
            entry.client = client;
            entry.ticket = ticket;
            let slot = entry.slot;
            info!(room_id = %self.room_id, %client_id, %ticket, "member reconnected, older connection replaced");
            self.send_snapshot(&client_id).await;
            return Ok(Admission { ticket, slot });
        }

        if let Some(cap) = self.kind.capacity() {
            if self.members.len() >= cap {
                debug!(room_id = %self.room_id, %client_id, "room full, refusing");
                return Err(RoomError::RoomFull(self.room_id.clone()));
            }
        }

        let slot = self.game.as_ref().map(|_| self.free_slot());
        let member = client.member();
        self.members.insert(
            client_id.clone(),
            MemberEntry {
                client,
                ticket,
                slot,
            },
        );
        self.publish_count();

        info!(
            room_id = %self.room_id,
            %client_id,
            slot = ?slot,
            members = self.members.len(),
            "member joined"
        );

        self.send_snapshot(&client_id).await;
        self.broadcast_except(&client_id, ServerFrame::MemberJoined { member });
        if let Some(view) = self.game_view() {
            self.broadcast_except(&client_id, ServerFrame::GameState(view));
        }

        Ok(Admission { ticket, slot })
    }

    fn handle_unregister(&mut self, client_id: &ClientId, ticket: Ticket) {
        if self.current_member(client_id, ticket).is_none() {
            debug!(room_id = %self.room_id, %client_id, %ticket, "unregister for absent member, ignoring");
            return;
        }
        self.remove_member(client_id, "disconnected");
    }

    /// Removes a member, which closes its queue, and tells the others.
    fn remove_member(&mut self, client_id: &ClientId, reason: &'static str) {
        let Some(entry) = self.members.remove(client_id) else {
            return;
        };
        self.publish_count();
        self.departed = true;

        info!(
            room_id = %self.room_id,
            %client_id,
            reason,
            members = self.members.len(),
            "member left"
        );

        let member = entry.client.member();
        drop(entry);

        self.broadcast(ServerFrame::MemberLeft { member });
        if let Some(view) = self.game_view() {
            self.broadcast(ServerFrame::GameState(view));
        }
    }

    /// Evicts every member whose queue refused a frame. Notices sent while
    /// evicting can refuse in turn; the loop runs until nothing is pending.
    fn settle_evictions(&mut self) {
        while let Some((client_id, reason)) = self.evictions.pop_front() {
            if self.members.contains_key(&client_id) {
                warn!(room_id = %self.room_id, %client_id, reason, "evicting member");
                self.remove_member(&client_id, reason);
            }
        }
    }

    // -- frames -----------------------------------------------------------

    async fn handle_frame(&mut self, sender: ClientId, slot: Option<PlayerSlot>, frame: ClientFrame) {
        match frame {
            ClientFrame::Chat { text } => self.handle_chat(sender, text).await,
            ClientFrame::Signal(signal) => self.handle_signal(sender, signal),
            ClientFrame::Move(position) => {
                let Some(slot) = slot else {
                    debug!(room_id = %self.room_id, client_id = %sender, "move outside a game room, ignoring");
                    return;
                };
                if let Some(game) = self.game.as_mut() {
                    game.paddles.set(slot, position);
                    game.paddle_tx.send_replace(game.paddles);
                }
                if let Some(view) = self.game_view() {
                    self.broadcast(ServerFrame::GameState(view));
                }
            }
            ClientFrame::Fire(at) => {
                let Some(slot) = slot else {
                    debug!(room_id = %self.room_id, client_id = %sender, "bullet outside a game room, ignoring");
                    return;
                };
                let Some(board) = self.game.as_ref().map(|game| game.board.clone()) else {
                    return;
                };
                let bullet = board.lock().await.spawn(at, slot);
                debug!(room_id = %self.room_id, bullet = %bullet.id, %slot, "bullet fired");
                self.broadcast(ServerFrame::BulletCreated(bullet));
            }
        }
    }

    async fn handle_chat(&mut self, sender: ClientId, text: String) {
        let name = self
            .members
            .get(&sender)
            .map(|entry| entry.client.identity().display_name.clone())
            .unwrap_or_default();
        let message = ChatMessage {
            sender,
            name,
            text,
            sent_at: Utc::now(),
        };

        if let Err(e) = self.store.append(&self.room_id, &message).await {
            warn!(room_id = %self.room_id, error = %e, "failed to persist chat message");
        }
        self.history.push(message);

        self.broadcast(ServerFrame::ChatLog {
            messages: self.history.clone(),
        });
    }

    fn handle_signal(&mut self, sender: ClientId, signal: SignalFrame) {
        let SignalFrame { kind, to, payload } = signal;
        match to {
            Some(target) => {
                if !self.members.contains_key(&target) {
                    debug!(
                        room_id = %self.room_id,
                        from = %sender,
                        to = %target,
                        %kind,
                        "signal target not in room, dropping"
                    );
                    return;
                }
                let frame = ServerFrame::Signal {
                    kind,
                    from: sender,
                    to: Some(target.clone()),
                    payload,
                };
                self.send_to(&target, Arc::new(frame));
            }
            None => {
                let frame = ServerFrame::Signal {
                    kind,
                    from: sender.clone(),
                    to: None,
                    payload,
                };
                self.broadcast_except(&sender, frame);
            }
        }
    }

    fn handle_simulated(&mut self, batch: Vec<SimEvent>) {
        for event in batch {
            let frame = match event {
                SimEvent::Moved(bullet) => ServerFrame::BulletUpdated(bullet),
                SimEvent::Hit { slot, bullet } => {
                    info!(room_id = %self.room_id, %slot, %bullet, "player hit");
                    ServerFrame::Hit { slot, bullet }
                }
                SimEvent::Removed(id) => ServerFrame::BulletRemoved { id },
            };
            self.broadcast(frame);
        }
    }

    // -- delivery ---------------------------------------------------------

    fn broadcast(&mut self, frame: ServerFrame) {
        let frame = Arc::new(frame);
        let targets: Vec<ClientId> = self.members.keys().cloned().collect();
        for id in targets {
            self.send_to(&id, frame.clone());
        }
    }

    fn broadcast_except(&mut self, excluded: &ClientId, frame: ServerFrame) {
        let frame = Arc::new(frame);
        let targets: Vec<ClientId> = self
            .members
            .keys()
            .filter(|id| *id != excluded)
            .cloned()
            .collect();
        for id in targets {
            self.send_to(&id, frame.clone());
        }
    }

    /// Non-blocking enqueue. A refusal schedules the member's eviction.
    fn send_to(&mut self, client_id: &ClientId, frame: Outbound) {
        let Some(entry) = self.members.get(client_id) else {
            return;
        };
        match entry.client.try_deliver(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.evictions.push_back((client_id.clone(), "outbound queue full"));
            }
            Err(TrySendError::Closed(_)) => {
                self.evictions.push_back((client_id.clone(), "connection gone"));
            }
        }
    }

    async fn send_snapshot(&mut self, client_id: &ClientId) {
        let Some(entry) = self.members.get(client_id) else {
            return;
        };
        let you = entry.client.member();
        let slot = entry.slot;

        let game = match (self.game.as_ref(), slot) {
            (Some(game), Some(slot)) => Some((slot, self.view_of(game), game.board.clone())),
            _ => None,
        };
        let game = match game {
            Some((slot, state, board)) => Some(GameSnapshot {
                slot,
                state,
                bullets: board.lock().await.bullets(),
            }),
            None => None,
        };

        let frame = ServerFrame::Snapshot {
            you,
            members: self.member_list(Some(client_id)),
            history: self.history.clone(),
            game,
        };
        self.send_to(client_id, Arc::new(frame));
    }

    // -- helpers ----------------------------------------------------------

    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    /// The member's slot if `ticket` is its current connection.
    fn current_member(&self, client_id: &ClientId, ticket: Ticket) -> Option<Option<PlayerSlot>> {
        self.members
            .get(client_id)
            .filter(|entry| entry.ticket == ticket)
            .map(|entry| entry.slot)
    }

    fn free_slot(&self) -> PlayerSlot {
        let taken = |slot| self.members.values().any(|entry| entry.slot == Some(slot));
        if taken(PlayerSlot::One) {
            PlayerSlot::Two
        } else {
            PlayerSlot::One
        }
    }

    /// Members in join order, optionally leaving one out.
    fn member_list(&self, excluded: Option<&ClientId>) -> Vec<Member> {
        let mut entries: Vec<&MemberEntry> = self
            .members
            .iter()
            .filter(|(id, _)| Some(*id) != excluded)
            .map(|(_, entry)| entry)
            .collect();
        entries.sort_by_key(|entry| entry.ticket.0);
        entries.into_iter().map(|entry| entry.client.member()).collect()
    }

    fn view_of(&self, game: &GameRoom) -> GameView {
        GameView {
            ready: self.members.len() == 2,
            ball: game.ball,
            player1: game.paddles.player1,
            player2: game.paddles.player2,
        }
    }

    fn game_view(&self) -> Option<GameView> {
        self.game.as_ref().map(|game| self.view_of(game))
    }

    fn publish_count(&self) {
        self.member_gauge.store(self.members.len(), Ordering::Release);
    }

    async fn info(&self) -> RoomInfo {
        let bullets = match &self.game {
            Some(game) => game.board.lock().await.len(),
            None => 0,
        };
        RoomInfo {
            room_id: self.room_id.clone(),
            kind: self.kind,
            members: self.member_list(None),
            history_len: self.history.len(),
            bullets,
        }
    }

    // -- reclamation ------------------------------------------------------

    async fn release(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.release_if_empty(&self.room_id, self.generation).await,
            None => false,
        }
    }

    /// Closes the mailbox and answers whatever was already queued.
    async fn refuse_pending(&mut self) {
        self.receiver.close();
        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Register { reply, .. } => {
                    let _ = reply.send(Err(RoomError::Unavailable(self.room_id.clone())));
                }
                RoomCommand::Info { reply } => {
                    let _ = reply.send(self.info().await);
                }
                RoomCommand::Unregister { .. } | RoomCommand::Frame { .. } => {}
            }
        }
    }
}

async fn next_sim_batch(game: &mut Option<GameRoom>) -> Option<Vec<SimEvent>> {
    match game {
        Some(game) => game.sim_events.recv().await,
        None => std::future::pending().await,
    }
}

/// Spawns a room actor (and, for game rooms, its simulation task).
pub(crate) fn spawn_room<S: ChatStore>(
    room_id: RoomId,
    kind: RoomKind,
    generation: u64,
    config: &RoomConfig,
    store: Arc<S>,
    registry: Weak<Shared<S>>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));
    let member_gauge = Arc::new(AtomicUsize::new(0));

    let game = match kind {
        RoomKind::Chat => None,
        RoomKind::Game => {
            let game_config = config.game.clone();
            let paddles = Paddles::starting(&game_config);
            let (paddle_tx, paddle_rx) = watch::channel(paddles);
            let (sim_tx, sim_rx) = mpsc::channel(8);
            let board: SharedBoard = Arc::new(Mutex::new(BulletBoard::new()));
            let ball = game_config.ball;
            let sim_task = tokio::spawn(run_simulation(
                room_id.clone(),
                game_config,
                board.clone(),
                paddle_rx,
                sim_tx,
            ));
            Some(GameRoom {
                paddles,
                ball,
                paddle_tx,
                board,
                sim_events: sim_rx,
                sim_task,
            })
        }
    };

    let actor = RoomActor {
        room_id: room_id.clone(),
        kind,
        generation,
        members: HashMap::new(),
        history: Vec::new(),
        next_ticket: 0,
        member_gauge: member_gauge.clone(),
        evictions: VecDeque::new(),
        departed: false,
        game,
        store,
        registry,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        kind,
        generation,
        sender: tx,
        members: member_gauge,
    }
}
