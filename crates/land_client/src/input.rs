//! Keyboard input.
//!
//! Input is line-based: every character of a line is a key, except lines
//! starting with `/`, which are commands. Parsed [`Command`]s are queued to
//! the game loop and applied at the next tick.

use land_net::ActionCode;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A local request for the game loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Perform a player action.
    Act(ActionCode),
    /// Send a chat line.
    Say(String),
    /// Leave the game.
    Quit,
}

/// Map a single key to its action.
#[must_use]
pub fn key_action(key: char) -> Option<ActionCode> {
    match key {
        'w' | 'k' => Some(ActionCode::MoveUp),
        's' | 'j' => Some(ActionCode::MoveDown),
        'a' | 'h' => Some(ActionCode::MoveLeft),
        'd' | 'l' => Some(ActionCode::MoveRight),
        ',' | 'g' => Some(ActionCode::ItemPickup),
        'x' => Some(ActionCode::ItemDrop),
        'i' => Some(ActionCode::ListInventory),
        _ => None,
    }
}

/// Parse one input line.
///
/// Unknown keys are skipped. An unknown `/` command yields nothing.
#[must_use]
pub fn parse_line(line: &str) -> Vec<Command> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('/') {
        let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        return match name {
            "say" if !arg.trim().is_empty() => vec![Command::Say(arg.trim().to_string())],
            "quit" | "q" => vec![Command::Quit],
            _ => {
                debug!(command = name, "unknown command");
                Vec::new()
            }
        };
    }
    line.chars().filter_map(key_action).map(Command::Act).collect()
}

/// Read lines from `input` and queue their commands until the input ends or
/// the loop stops listening.
///
/// End of input queues [`Command::Quit`].
pub async fn read_commands<R>(input: R, tx: mpsc::Sender<Command>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(%e, "reading input failed");
                break;
            }
        };
        for command in parse_line(&line) {
            if tx.send(command).await.is_err() {
                return;
            }
        }
    }
    let _ = tx.send(Command::Quit).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(
            parse_line("wdx"),
            vec![
                Command::Act(ActionCode::MoveUp),
                Command::Act(ActionCode::MoveRight),
                Command::Act(ActionCode::ItemDrop),
            ]
        );
        assert_eq!(parse_line("hjkl").len(), 4);
        assert_eq!(parse_line(" ?! "), Vec::new());
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            parse_line("/say hello there"),
            vec![Command::Say("hello there".to_string())]
        );
        assert_eq!(parse_line("/say   "), Vec::new());
        assert_eq!(parse_line("/quit"), vec![Command::Quit]);
        assert_eq!(parse_line("/dance"), Vec::new());
    }

    #[tokio::test]
    async fn test_read_commands_ends_with_quit() {
        let (tx, mut rx) = mpsc::channel(16);
        read_commands(&b"w\n/say hi\n"[..], tx).await;

        assert_eq!(rx.recv().await, Some(Command::Act(ActionCode::MoveUp)));
        assert_eq!(rx.recv().await, Some(Command::Say("hi".to_string())));
        assert_eq!(rx.recv().await, Some(Command::Quit));
        assert_eq!(rx.recv().await, None);
    }
}
