//! Line-oriented terminal frontend.
//!
//! Stands in for a real display surface and input source so the daemon can
//! be driven from a plain terminal: stdin lines become input events, render
//! frames are printed to stdout. The navigator knows nothing about it
//! beyond the [`UiEvent`]/[`UiCommand`] channels.
//!
//! Input protocol: every character of a line is delivered as a key press
//! (`w`/`s` scroll, `a`/`d` skip, `p` play/pause, `m` menu, `q` quit) and an
//! empty line means Select/Enter. A line consisting of just `b` goes back;
//! inside a longer line `b` is an ordinary character, so passwords can
//! contain it. A line like `@120 80` taps the click wheel at those
//! coordinates (press and release), which is how the center button and the
//! ring quadrants can be exercised without a real pointer device. Password
//! entry works the same way as navigation: type the password as a line,
//! then an empty line to submit.

use crate::daemon::ui::{Frame, UiCommand, UiEvent};
use crate::daemon::wheel::{KeyInput, Phase, PointerSample};
use std::fmt::Write as _;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub async fn run(
    event_tx: Sender<UiEvent>,
    mut command_rx: Receiver<UiCommand>,
) -> eyre::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        for event in line_events(&line) {
                            event_tx.send(event).await?;
                        }
                    }
                    None => {
                        info!("stdin closed, asking the navigator to quit");
                        event_tx.send(UiEvent::Quit).await?;
                        break;
                    }
                }
            },
            command = command_rx.recv() => {
                match command {
                    Some(UiCommand::Render(frame)) => {
                        stdout.write_all(draw(&frame).as_bytes()).await?;
                        stdout.flush().await?;
                    }
                    None => {
                        debug!("Command channel closed, frontend exiting");
                        break;
                    }
                }
            },
        }
    }
    Ok(())
}

fn line_events(line: &str) -> Vec<UiEvent> {
    if let Some(rest) = line.strip_prefix('@') {
        // A tap: press and release at the same spot.
        return match parse_point(rest) {
            Some((x, y)) => vec![
                UiEvent::Pointer(PointerSample {
                    x,
                    y,
                    phase: Phase::Down,
                }),
                UiEvent::Pointer(PointerSample {
                    x,
                    y,
                    phase: Phase::Up,
                }),
            ],
            None => Vec::new(),
        };
    }
    if line.is_empty() {
        return vec![UiEvent::Key(KeyInput::Enter)];
    }
    if line == "b" {
        return vec![UiEvent::Key(KeyInput::Escape)];
    }
    line.chars()
        .map(|c| {
            UiEvent::Key(match c {
                '\u{7f}' | '\u{8}' => KeyInput::Backspace,
                '\u{1b}' => KeyInput::Escape,
                c => KeyInput::Char(c),
            })
        })
        .collect()
}

fn parse_point(text: &str) -> Option<(f32, f32)> {
    let mut parts = text.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    Some((x, y))
}

fn draw(frame: &Frame) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "== {} ==", frame.title);
    for (i, row) in frame.rows.iter().enumerate() {
        let marker = if frame.selected == Some(i) { '>' } else { ' ' };
        match &row.sublabel {
            Some(sublabel) if !sublabel.is_empty() => {
                let _ = writeln!(out, " {marker} {}  ({sublabel})", row.label);
            }
            _ => {
                let _ = writeln!(out, " {marker} {}", row.label);
            }
        }
    }
    if let Some(now_playing) = &frame.now_playing {
        let state = if now_playing.paused {
            "paused"
        } else if now_playing.playing {
            "playing"
        } else {
            "stopped"
        };
        let track = now_playing
            .playlist_position
            .map(|(index, total)| format!(" {}/{}", index + 1, total))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "♪ {} - {} ({}) [{}{}] {}/{}",
            now_playing.title,
            now_playing.artist,
            now_playing.album,
            state,
            track,
            format_time(now_playing.position_secs),
            format_time(now_playing.duration_secs),
        );
    }
    if let Some(status) = &frame.status {
        let _ = writeln!(out, "! {status}");
    }
    out
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::ui::Row;
    use assert_matches::assert_matches;

    #[test]
    fn empty_line_is_enter() {
        assert_eq!(line_events(""), vec![UiEvent::Key(KeyInput::Enter)]);
    }

    #[test]
    fn characters_pass_through_for_text_entry() {
        assert_eq!(
            line_events("wq"),
            vec![
                UiEvent::Key(KeyInput::Char('w')),
                UiEvent::Key(KeyInput::Char('q'))
            ]
        );
        assert_eq!(line_events("b"), vec![UiEvent::Key(KeyInput::Escape)]);
        // Only a lone `b` backs out; in longer input it is a plain character.
        assert_eq!(
            line_events("ab"),
            vec![
                UiEvent::Key(KeyInput::Char('a')),
                UiEvent::Key(KeyInput::Char('b'))
            ]
        );
    }

    #[test]
    fn tap_lines_become_a_pointer_press_and_release() {
        let events = line_events("@120 80.5");
        assert_eq!(events.len(), 2);
        assert_matches!(
            events[0],
            UiEvent::Pointer(PointerSample {
                x,
                y,
                phase: Phase::Down
            }) if x == 120.0 && y == 80.5
        );
        assert_matches!(events[1], UiEvent::Pointer(PointerSample { phase: Phase::Up, .. }));
        assert!(line_events("@oops").is_empty());
    }

    #[test]
    fn frame_renders_selection_marker() {
        let frame = Frame {
            title: "Music".to_string(),
            rows: vec![
                Row {
                    label: "Artists".to_string(),
                    sublabel: None,
                    selectable: true,
                },
                Row {
                    label: "Albums".to_string(),
                    sublabel: None,
                    selectable: true,
                },
            ],
            selected: Some(1),
            now_playing: None,
            status: None,
        };
        let drawn = draw(&frame);
        assert!(drawn.contains("== Music =="));
        assert!(drawn.contains("   Artists"));
        assert!(drawn.contains(" > Albums"));
    }
}
