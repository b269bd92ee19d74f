//! Game variant: paddles, the bullet board and the simulation loop.
//!
//! The room actor owns paddle positions and slot assignment. The bullet
//! board is the one piece of room state it shares: the actor inserts
//! bullets when players fire, and the simulation task advances and
//! removes them on its own clock. Both sides take the board's mutex for
//! the duration of one operation and never hold it across an await on
//! anything else.

use std::collections::BTreeMap;
use std::sync::Arc;

use huddle_protocol::{Bullet, BulletId, PlayerSlot, Point, RoomId};
use huddle_tick::TickScheduler;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, trace};

use crate::GameConfig;

// ---------------------------------------------------------------------------
// Paddles
// ---------------------------------------------------------------------------

/// Positions of both paddles, indexed by slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddles {
    pub player1: Point,
    pub player2: Point,
}

impl Paddles {
    pub fn starting(config: &GameConfig) -> Self {
        Self {
            player1: config.player1,
            player2: config.player2,
        }
    }

    pub fn get(&self, slot: PlayerSlot) -> Point {
        match slot {
            PlayerSlot::One => self.player1,
            PlayerSlot::Two => self.player2,
        }
    }

    pub fn set(&mut self, slot: PlayerSlot, position: Point) {
        match slot {
            PlayerSlot::One => self.player1 = position,
            PlayerSlot::Two => self.player2 = position,
        }
    }
}

// ---------------------------------------------------------------------------
// Bullet board
// ---------------------------------------------------------------------------

/// Live bullets of one room plus the id counter.
///
/// Ids start at 1 and are never reused, even after the bullet is gone.
#[derive(Debug, Default)]
pub struct BulletBoard {
    bullets: BTreeMap<BulletId, Bullet>,
    last_id: u64,
}

/// The board as shared between the room actor and its simulation task.
pub type SharedBoard = Arc<Mutex<BulletBoard>>;

impl BulletBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a new bullet and returns it with its assigned id.
    pub fn spawn(&mut self, at: Point, owner: PlayerSlot) -> Bullet {
        self.last_id += 1;
        let bullet = Bullet {
            id: BulletId(self.last_id),
            x: at.x,
            y: at.y,
            owner,
        };
        self.bullets.insert(bullet.id, bullet);
        bullet
    }

    /// Live bullets in id order.
    pub fn bullets(&self) -> Vec<Bullet> {
        self.bullets.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.bullets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty()
    }

    pub fn get(&self, id: BulletId) -> Option<&Bullet> {
        self.bullets.get(&id)
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// One observable outcome of a simulation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    /// A bullet survived the tick at its new position.
    Moved(Bullet),
    /// `slot` was struck by `bullet`. Always followed by its `Removed`.
    Hit { slot: PlayerSlot, bullet: BulletId },
    /// The bullet is gone; its id will not appear again.
    Removed(BulletId),
}

/// Advances every bullet by one tick.
///
/// Slot-1 bullets travel toward smaller `y`, slot-2 bullets toward larger
/// `y`. A bullet that leaves the arena is removed. One that ends up
/// strictly inside the hit box of the opposing paddle produces a hit and
/// is removed. Removed bullets are gone from the board when this returns.
pub fn step(board: &mut BulletBoard, paddles: &Paddles, config: &GameConfig) -> Vec<SimEvent> {
    let mut events = Vec::with_capacity(board.bullets.len());
    let mut gone = Vec::new();

    for bullet in board.bullets.values_mut() {
        let (dy, out_of_bounds) = match bullet.owner {
            PlayerSlot::One => (-config.bullet_speed, bullet.y - config.bullet_speed < config.arena.min_y),
            PlayerSlot::Two => (config.bullet_speed, bullet.y + config.bullet_speed > config.arena.max_y),
        };
        bullet.y += dy;

        if out_of_bounds {
            gone.push(bullet.id);
            events.push(SimEvent::Removed(bullet.id));
            continue;
        }

        let target = bullet.owner.opponent();
        let paddle = paddles.get(target);
        if (bullet.x - paddle.x).abs() < config.hit_radius
            && (bullet.y - paddle.y).abs() < config.hit_radius
        {
            gone.push(bullet.id);
            events.push(SimEvent::Hit {
                slot: target,
                bullet: bullet.id,
            });
            events.push(SimEvent::Removed(bullet.id));
            continue;
        }

        events.push(SimEvent::Moved(*bullet));
    }

    for id in gone {
        board.bullets.remove(&id);
    }
    events
}

/// Runs the simulation loop for one room until the actor stops listening.
///
/// Each tick locks the board, steps it against the latest paddle
/// positions, releases the lock and hands the events to the actor.
pub(crate) async fn run_simulation(
    room_id: RoomId,
    config: GameConfig,
    board: SharedBoard,
    paddles: watch::Receiver<Paddles>,
    events: mpsc::Sender<Vec<SimEvent>>,
) {
    let mut ticks = TickScheduler::new(config.tick.clone());
    debug!(%room_id, period = ?config.tick.period, policy = ?config.tick.policy, "simulation started");

    loop {
        let info = ticks.next_tick().await;

        let positions = *paddles.borrow();
        let batch = {
            let mut board = board.lock().await;
            if board.is_empty() {
                Vec::new()
            } else {
                step(&mut board, &positions, &config)
            }
        };
        ticks.record_tick_end();

        if batch.is_empty() {
            continue;
        }
        trace!(%room_id, tick = info.tick, events = batch.len(), "simulation tick");
        if events.send(batch).await.is_err() {
            break;
        }
    }

    let metrics = ticks.metrics();
    debug!(
        %room_id,
        ticks = metrics.total_ticks,
        overruns = metrics.total_overruns,
        max_tick_us = metrics.max_tick_time.as_micros() as u64,
        "simulation stopped"
    );
}
