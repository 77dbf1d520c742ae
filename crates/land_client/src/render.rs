//! Read-only rendering surface.
//!
//! Rendering proper lives outside the core; it only ever sees a [`View`] of
//! the session. The bundled [`TextRenderer`] prints new chat lines and the
//! controlled entity's position whenever it changes.

use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;

use land_math::Position;
use tracing::{trace, warn};

use crate::mirror::Mirror;
use crate::session::SessionState;

/// Lines kept in the chat log.
pub const CHAT_LOG_CAPACITY: usize = 100;

/// Bounded log of chat and status lines shown to the player.
#[derive(Debug, Default)]
pub struct ChatLog {
    lines: VecDeque<String>,
    /// Lines ever pushed, including evicted ones.
    total: u64,
}

impl ChatLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line, evicting the oldest once full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == CHAT_LOG_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
        self.total += 1;
    }

    /// Retained lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// The most recent line.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    /// Number of lines ever pushed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Retained lines pushed after the first `seen` lines.
    pub fn since(&self, seen: u64) -> impl Iterator<Item = &str> {
        let evicted = self.total - self.lines.len() as u64;
        let skip = seen.saturating_sub(evicted) as usize;
        self.lines.iter().skip(skip).map(String::as_str)
    }
}

/// What a renderer gets to look at each tick.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    /// Ticks run so far.
    pub tick_id: u64,
    /// Clamped delta of this tick.
    pub delta: Duration,
    /// Where the handshake stands.
    pub state: SessionState,
    /// The world as the client currently believes it to be.
    pub mirror: &'a Mirror,
    /// Chat and status lines.
    pub chat: &'a ChatLog,
}

/// The rendering surface.
pub trait Renderer {
    /// Draw one frame.
    fn render(&mut self, view: View<'_>);
}

/// Line-oriented renderer writing to any [`Write`] sink.
#[derive(Debug)]
pub struct TextRenderer<W> {
    out: W,
    chat_seen: u64,
    last_position: Option<Position>,
    last_state: Option<SessionState>,
}

impl<W: Write> TextRenderer<W> {
    /// Render into `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            chat_seen: 0,
            last_position: None,
            last_state: None,
        }
    }

    /// Consume the renderer, returning the sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, view: View<'_>) -> std::io::Result<()> {
        if self.last_state != Some(view.state) {
            writeln!(self.out, "[{:?}]", view.state)?;
            self.last_state = Some(view.state);
        }
        for line in view.chat.since(self.chat_seen) {
            writeln!(self.out, "{line}")?;
        }
        self.chat_seen = view.chat.total();

        let position = view.mirror.controlled_entity().map(|e| e.position);
        if position != self.last_position {
            if let Some(entity) = view.mirror.controlled_entity() {
                writeln!(
                    self.out,
                    "{} at {},{} ({} entities in view)",
                    entity.name,
                    entity.position.x,
                    entity.position.y,
                    view.mirror.len()
                )?;
            }
            self.last_position = position;
        }
        self.out.flush()
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, view: View<'_>) {
        trace!(tick_id = view.tick_id, delta_ms = view.delta.as_millis() as u64, "render");
        if let Err(e) = self.draw(view) {
            warn!(%e, "render output failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use land_component::{Entity, EntityId};

    use super::*;

    #[test]
    fn test_chat_log_evicts_oldest() {
        let mut log = ChatLog::new();
        for i in 0..CHAT_LOG_CAPACITY + 5 {
            log.push(format!("line {i}"));
        }
        assert_eq!(log.lines().count(), CHAT_LOG_CAPACITY);
        assert_eq!(log.lines().next(), Some("line 5"));
        assert_eq!(log.last(), Some(format!("line {}", CHAT_LOG_CAPACITY + 4).as_str()));
        assert_eq!(log.total(), CHAT_LOG_CAPACITY as u64 + 5);
    }

    #[test]
    fn test_chat_log_since() {
        let mut log = ChatLog::new();
        log.push("a");
        log.push("b");
        log.push("c");
        assert_eq!(log.since(1).collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(log.since(3).count(), 0);
    }

    #[test]
    fn test_text_renderer_prints_changes_once() {
        let mut mirror = Mirror::new();
        mirror.insert(Entity::new(EntityId(7)).named("alice").at(Position::new(3, 4)));
        mirror.set_controlled(EntityId(7));
        let mut chat = ChatLog::new();
        chat.push("Welcome, alice!");

        let mut renderer = TextRenderer::new(Vec::new());
        for tick_id in 1..=3 {
            renderer.render(View {
                tick_id,
                delta: Duration::from_millis(40),
                state: SessionState::Synchronized,
                mirror: &mirror,
                chat: &chat,
            });
        }

        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out.matches("Welcome, alice!").count(), 1);
        assert_eq!(out.matches("alice at 3,4").count(), 1);
        assert_eq!(out.matches("[Synchronized]").count(), 1);
    }
}
