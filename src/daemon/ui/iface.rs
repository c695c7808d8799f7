//! Channel vocabulary between the navigator and the frontend.

use crate::daemon::wheel::{KeyInput, PointerSample};

/// Raw input from the frontend, one event per pointer sample or key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiEvent {
    Pointer(PointerSample),
    Key(KeyInput),
    /// The frontend is going away (window closed, stdin EOF).
    Quit,
}

/// Instructions to the frontend.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    Render(Frame),
}

/// Read-only projection of the navigation state, everything the display
/// surface needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub title: String,
    /// The visible window of rows, already scrolled and padded.
    pub rows: Vec<Row>,
    /// Index of the highlighted row within `rows`, if any is visible.
    pub selected: Option<usize>,
    pub now_playing: Option<NowPlayingLine>,
    /// Transient status message, e.g. a playback failure.
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub label: String,
    pub sublabel: Option<String>,
    pub selectable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingLine {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub playing: bool,
    pub paused: bool,
    /// (index, total) within the active playlist.
    pub playlist_position: Option<(usize, usize)>,
}
