//! Client game loop.
//!
//! One task owns the [`Session`] and merges four event sources:
//!
//! 1. the shutdown future,
//! 2. a fixed-rate ticker,
//! 3. the inbound packet receiver,
//! 4. queued local commands.
//!
//! Inbound packets are dispatched as they arrive. Commands are buffered and
//! applied at the start of the next tick, after which the tick counter
//! advances and the renderer is handed a [`View`].

use std::future::Future;
use std::time::{Duration, Instant};

use land_net::{PacketReceiver, ServerPacket};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::input::Command;
use crate::render::{Renderer, View};
use crate::session::Session;

/// Measures the time between ticks, clamped to an upper bound.
#[derive(Debug)]
pub struct DeltaTimer {
    last: Instant,
    max_delta: Duration,
}

impl DeltaTimer {
    /// Start measuring now.
    #[must_use]
    pub fn new(max_delta: Duration) -> Self {
        Self {
            last: Instant::now(),
            max_delta,
        }
    }

    /// Time since the previous call, at most `max_delta`.
    pub fn next(&mut self) -> Duration {
        let now = Instant::now();
        let delta = clamp_delta(now.duration_since(self.last), self.max_delta);
        self.last = now;
        delta
    }
}

/// Clamp a raw delta so a stall never turns into one huge step.
#[must_use]
pub fn clamp_delta(raw: Duration, max_delta: Duration) -> Duration {
    raw.min(max_delta)
}

/// The client's fixed-rate loop around one session.
pub struct Game<R> {
    session: Session,
    renderer: R,
    tick_period: Duration,
    timer: DeltaTimer,
    pending: Vec<Command>,
    tick_id: u64,
    elapsed: Duration,
    quit: bool,
}

impl<R: Renderer> Game<R> {
    /// Wrap a session, ticking every `tick_period`.
    #[must_use]
    pub fn new(session: Session, renderer: R, tick_period: Duration, max_delta: Duration) -> Self {
        Self {
            session,
            renderer,
            tick_period,
            timer: DeltaTimer::new(max_delta),
            pending: Vec::new(),
            tick_id: 0,
            elapsed: Duration::ZERO,
            quit: false,
        }
    }

    /// Ticks run so far.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Sum of clamped deltas.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The wrapped session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Queue a command for the next tick.
    pub fn enqueue(&mut self, command: Command) {
        self.pending.push(command);
    }

    /// Run one tick with the given delta.
    pub fn tick(&mut self, delta: Duration) {
        for command in std::mem::take(&mut self.pending) {
            match command {
                Command::Act(action) => {
                    self.session.perform(action);
                }
                Command::Say(text) => self.session.say(text),
                Command::Quit => self.quit = true,
            }
        }
        self.tick_id += 1;
        self.elapsed += delta;
        self.renderer.render(View {
            tick_id: self.tick_id,
            delta,
            state: self.session.state(),
            mirror: self.session.mirror(),
            chat: self.session.chat(),
        });
    }

    /// Run until `shutdown` resolves or a [`Command::Quit`] has been applied.
    ///
    /// The loop keeps ticking after the inbound stream ends; the session is
    /// simply offline from then on. Returns the session for inspection.
    pub async fn run<F>(
        mut self,
        mut inbound: PacketReceiver<ServerPacket>,
        mut commands: mpsc::Receiver<Command>,
        shutdown: F,
    ) -> Session
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut inbound_open = true;
        let mut commands_open = true;
        tokio::pin!(shutdown);

        info!(period_ms = self.tick_period.as_millis() as u64, "game loop started");
        while !self.quit {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let delta = self.timer.next();
                    self.tick(delta);
                }
                item = inbound.recv(), if inbound_open => match item {
                    Some(item) => self.session.dispatch(item),
                    None => {
                        inbound_open = false;
                        self.session.disconnect();
                    }
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.enqueue(command),
                    None => {
                        debug!("input closed");
                        commands_open = false;
                    }
                },
            }
        }
        info!(ticks = self.tick_id, "game loop finished");
        self.session
    }
}
