//! The navigation controller.
//!
//! [`Navigator`] owns the whole UI state: the active screen, the back-stack,
//! the rows of the current list, playback bookkeeping, and the optional
//! modal. Decoded intents arrive over the event channel, are applied in
//! emission order, and each applied batch produces one render frame for the
//! display surface. Collaborator work (audio, network) leaves over command
//! channels and comes back as events into the same select loop, so the state
//! is only ever touched from this task.

use crate::config::Config;
use crate::daemon::audio::{AudioCommand, AudioEvent};
use crate::daemon::library::{self, Library, Song};
use crate::daemon::net::{NetCommand, NetEvent, WifiNetwork};
use crate::daemon::wheel::{self, Intent, KeyInput, Wheel, WheelButton, WheelLayout};
use crate::util::IterExt;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, info, warn};

mod iface;
mod item;

pub use iface::{Frame, NowPlayingLine, Row, UiCommand, UiEvent};
pub use item::{Action, MenuItem};


/// Identity of the active UI mode. Screens that filter by something carry
/// that context with them so reloads are self-contained.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    MainMenu,
    MusicMenu,
    VideoMenu,
    ArtistList,
    AlbumList,
    AllSongs,
    SongsByArtist(Arc<str>),
    SongsByAlbum(Arc<str>),
    NowPlaying,
    Settings,
    CoverFlow,
    VideoPlaying(Arc<PathBuf>),
    WifiMenu,
    WifiNetworkList,
    WifiPasswordEntry(Arc<str>),
    WifiConnecting(Arc<str>),
}

impl Screen {
    fn title(&self) -> String {
        let title = match self {
            Screen::MainMenu => "podwheel",
            Screen::MusicMenu => "Music",
            Screen::VideoMenu => "Videos",
            Screen::ArtistList => "Artists",
            Screen::AlbumList => "Albums",
            Screen::AllSongs => "Songs",
            Screen::SongsByArtist(artist) => artist,
            Screen::SongsByAlbum(album) => album,
            Screen::NowPlaying => "Now Playing",
            Screen::Settings => "Settings",
            Screen::CoverFlow => "Cover Flow",
            Screen::VideoPlaying(_) => "Video",
            Screen::WifiMenu => "WiFi",
            Screen::WifiNetworkList => "WiFi Networks",
            Screen::WifiPasswordEntry(_) => "WiFi Password",
            Screen::WifiConnecting(_) => "Connecting",
        };
        truncate(title, 20)
    }
}

/// A sub-mode that takes over intent handling while active. At most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    VolumeAdjust,
    PasswordEntry,
    VideoPlaying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::One,
            RepeatMode::One => RepeatMode::All,
            RepeatMode::All => RepeatMode::Off,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RepeatMode::Off => "Off",
            RepeatMode::One => "One",
            RepeatMode::All => "All",
        }
    }
}

pub struct Navigator {
    ui_command_tx: Sender<UiCommand>,
    ui_event_rx: Receiver<UiEvent>,
    audio_command_tx: Sender<AudioCommand>,
    audio_event_rx: Receiver<AudioEvent>,
    net_command_tx: Sender<NetCommand>,
    net_event_rx: Receiver<NetEvent>,

    config: Arc<Config>,
    library: Box<dyn Library>,
    wheel: Wheel,

    screen: Screen,
    back_stack: Vec<Screen>,
    items: Vec<MenuItem>,
    selected: usize,
    scroll_offset: usize,
    modal: Option<Modal>,
    status: Option<String>,
    quit: bool,

    playlist: Vec<Arc<Song>>,
    playlist_index: Option<usize>,
    current_song: Option<Arc<Song>>,
    song_duration_secs: f64,
    position_secs: f64,
    playing: bool,
    paused: bool,
    volume: f32,
    repeat: RepeatMode,
    shuffle: bool,

    networks: Vec<Arc<WifiNetwork>>,
    scanning: bool,
    connection: Option<String>,
    password_input: String,
    video: Option<tokio::process::Child>,
}

impl Navigator {
    pub fn new(
        config: Arc<Config>,
        library: Box<dyn Library>,
    ) -> (
        Self,
        Sender<UiEvent>,
        Receiver<UiCommand>,
        Sender<AudioEvent>,
        Receiver<AudioCommand>,
        Sender<NetEvent>,
        Receiver<NetCommand>,
    ) {
        let (ui_event_tx, ui_event_rx) = tokio::sync::mpsc::channel(16);
        let (ui_command_tx, ui_command_rx) = tokio::sync::mpsc::channel(16);
        let (audio_event_tx, audio_event_rx) = tokio::sync::mpsc::channel(16);
        let (audio_command_tx, audio_command_rx) = tokio::sync::mpsc::channel(16);
        let (net_event_tx, net_event_rx) = tokio::sync::mpsc::channel(16);
        let (net_command_tx, net_command_rx) = tokio::sync::mpsc::channel(16);
        let navigator = Navigator {
            ui_command_tx,
            ui_event_rx,
            audio_command_tx,
            audio_event_rx,
            net_command_tx,
            net_event_rx,
            wheel: Wheel::new(WheelLayout::from(&config.wheel)),
            volume: config.initial_volume.clamp(0.0, 1.0),
            config,
            library,
            screen: Screen::MainMenu,
            back_stack: Vec::new(),
            items: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            modal: None,
            status: None,
            quit: false,
            playlist: Vec::new(),
            playlist_index: None,
            current_song: None,
            song_duration_secs: 0.0,
            position_secs: 0.0,
            playing: false,
            paused: false,
            repeat: RepeatMode::default(),
            shuffle: false,
            networks: Vec::new(),
            scanning: false,
            connection: None,
            password_input: String::new(),
            video: None,
        };
        (
            navigator,
            ui_event_tx,
            ui_command_rx,
            audio_event_tx,
            audio_command_rx,
            net_event_tx,
            net_command_rx,
        )
    }

    pub async fn init(&mut self) -> eyre::Result<()> {
        self.audio_command_tx
            .send(AudioCommand::SetVolume(self.volume))
            .await?;
        self.load_screen();
        self.render().await
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(mut self) -> eyre::Result<()> {
        loop {
            tokio::select! {
                event = self.ui_event_rx.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(e) = self.handle_ui_event(event).await {
                                warn!(error = %e, "Error handling input event");
                            }
                        }
                        None => {
                            info!("Input channel closed, shutting down");
                            break;
                        }
                    }
                },
                event = self.audio_event_rx.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(e) = self.handle_audio_event(event).await {
                                warn!(error = %e, "Error handling audio event");
                            }
                        }
                        None => {
                            info!("Audio channel closed. I sure hope this is part of a shutdown sequence");
                        }
                    }
                },
                event = self.net_event_rx.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(e) = self.handle_net_event(event).await {
                                warn!(error = %e, "Error handling network event");
                            }
                        }
                        None => {
                            info!("Network channel closed. I sure hope this is part of a shutdown sequence");
                        }
                    }
                },
            }
            if self.quit {
                info!("Quit requested");
                break;
            }
        }
        self.stop_video();
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "trace")]
    async fn handle_ui_event(&mut self, event: UiEvent) -> eyre::Result<()> {
        match event {
            UiEvent::Pointer(sample) => {
                let intents = self.wheel.decode_pointer(sample);
                self.apply_intents(&intents).await?;
            }
            UiEvent::Key(key) => {
                if self.modal == Some(Modal::PasswordEntry) {
                    self.password_key(key).await?;
                } else {
                    let intents = wheel::decode_key(key);
                    self.apply_intents(&intents).await?;
                }
            }
            UiEvent::Quit => {
                self.quit = true;
            }
        }
        self.render().await
    }

    #[tracing::instrument(skip(self), level = "trace")]
    async fn handle_audio_event(&mut self, event: AudioEvent) -> eyre::Result<()> {
        match event {
            AudioEvent::Loaded { duration, .. } => {
                if let Some(duration) = duration {
                    self.song_duration_secs = duration.as_secs_f64();
                }
            }
            AudioEvent::LoadFailed { path, reason } => {
                warn!("Failed to load {:?}: {}", path, reason);
                self.status = Some(format!("Playback failed: {reason}"));
                self.playing = false;
                self.paused = false;
                self.current_song = None;
                if self.screen == Screen::NowPlaying {
                    self.pop_screen();
                }
            }
            AudioEvent::Progress { position } => {
                self.position_secs = position.as_secs_f64();
            }
            AudioEvent::Finished => {
                self.song_finished().await?;
            }
            AudioEvent::VolumeChanged(volume) => {
                self.volume = volume;
                if self.screen == Screen::Settings {
                    self.reload_screen();
                }
            }
        }
        self.render().await
    }

    #[tracing::instrument(skip(self), level = "trace")]
    async fn handle_net_event(&mut self, event: NetEvent) -> eyre::Result<()> {
        match event {
            NetEvent::ScanFinished(networks) => {
                self.scanning = false;
                self.networks = networks.into_iter().map(Arc::new).collect();
                if self.screen == Screen::WifiNetworkList {
                    self.reload_screen();
                }
            }
            NetEvent::Status(connection) => {
                self.connection = connection;
                if self.screen == Screen::WifiMenu {
                    self.reload_screen();
                }
            }
            NetEvent::ConnectFinished { ssid, ok, message } => {
                self.status = Some(message);
                if ok {
                    self.connection = Some(ssid.to_string());
                    self.networks = self
                        .networks
                        .iter()
                        .map(|n| {
                            let mut network = (**n).clone();
                            network.connected = network.ssid.as_str() == &*ssid;
                            Arc::new(network)
                        })
                        .collect();
                }
                if matches!(self.screen, Screen::WifiConnecting(_)) {
                    self.pop_screen();
                } else if self.screen == Screen::WifiNetworkList {
                    // The user backed out while the connect was in flight.
                    self.reload_screen();
                }
            }
        }
        self.render().await
    }

    /// Applies a decoded batch strictly in emission order, so a drag that
    /// produced three scroll intents moves the selection three rows.
    async fn apply_intents(&mut self, intents: &[Intent]) -> eyre::Result<()> {
        for intent in intents {
            self.apply_intent(*intent).await?;
            if self.quit {
                break;
            }
        }
        Ok(())
    }

    async fn apply_intent(&mut self, intent: Intent) -> eyre::Result<()> {
        self.status = None;
        if let Some(modal) = self.modal {
            return self.apply_modal_intent(modal, intent).await;
        }
        match intent {
            Intent::ScrollUp | Intent::NavigateUp => self.move_selection(-1),
            Intent::ScrollDown | Intent::NavigateDown => self.move_selection(1),
            Intent::NavigateLeft | Intent::Button(WheelButton::Backward) => {
                self.backward_pressed().await?;
            }
            Intent::NavigateRight | Intent::Button(WheelButton::Forward) => {
                self.forward_pressed().await?;
            }
            Intent::Select => self.select_current().await?,
            Intent::GoBack | Intent::Button(WheelButton::Menu) => self.go_back(),
            Intent::TogglePlayback | Intent::Button(WheelButton::PlayPause) => {
                self.toggle_playback().await?;
            }
            Intent::Quit => self.quit = true,
        }
        Ok(())
    }

    async fn apply_modal_intent(&mut self, modal: Modal, intent: Intent) -> eyre::Result<()> {
        match modal {
            Modal::VolumeAdjust => match intent {
                Intent::ScrollUp
                | Intent::NavigateUp
                | Intent::NavigateRight
                | Intent::Button(WheelButton::Forward) => {
                    self.nudge_volume(self.config.volume_step).await?;
                }
                Intent::ScrollDown
                | Intent::NavigateDown
                | Intent::NavigateLeft
                | Intent::Button(WheelButton::Backward) => {
                    self.nudge_volume(-self.config.volume_step).await?;
                }
                Intent::Select | Intent::GoBack | Intent::Button(WheelButton::Menu) => {
                    self.modal = None;
                    self.reload_screen();
                }
                Intent::Quit => self.quit = true,
                _ => {}
            },
            Modal::VideoPlaying => match intent {
                Intent::GoBack | Intent::Button(WheelButton::Menu) => {
                    self.stop_video();
                    self.modal = None;
                    self.pop_screen();
                }
                Intent::Quit => {
                    self.stop_video();
                    self.quit = true;
                }
                _ => {}
            },
            Modal::PasswordEntry => match intent {
                // Pointer gestures during text entry: only backing out works.
                Intent::GoBack | Intent::Button(WheelButton::Menu) => {
                    self.cancel_password_entry();
                }
                Intent::Quit => self.quit = true,
                _ => {}
            },
        }
        Ok(())
    }

    async fn password_key(&mut self, key: KeyInput) -> eyre::Result<()> {
        let Screen::WifiPasswordEntry(ssid) = self.screen.clone() else {
            // Modal without its screen is a stale leftover.
            self.modal = None;
            return Ok(());
        };
        self.status = None;
        match key {
            KeyInput::Enter => {
                self.modal = None;
                let password = std::mem::take(&mut self.password_input);
                self.net_command_tx
                    .send(NetCommand::Connect {
                        ssid: ssid.clone(),
                        password,
                    })
                    .await?;
                // Replace the password screen; Back from "connecting" should
                // land on the network list, not re-open text entry.
                self.screen = Screen::WifiConnecting(ssid);
                self.load_screen();
            }
            KeyInput::Backspace => {
                self.password_input.pop();
                self.reload_screen();
            }
            KeyInput::Escape => {
                self.cancel_password_entry();
            }
            KeyInput::Char(c) if !c.is_control() && self.password_input.chars().count() < 63 => {
                self.password_input.push(c);
                self.reload_screen();
            }
            _ => {}
        }
        Ok(())
    }

    fn cancel_password_entry(&mut self) {
        self.modal = None;
        self.password_input.clear();
        self.pop_screen();
    }

    /// Selection movement with wraparound; rows without an action are
    /// skipped. When no row is selectable the selection stays put.
    fn move_selection(&mut self, direction: isize) {
        let len = self.items.len();
        if len == 0 {
            return;
        }
        let mut index = self.selected;
        for _ in 0..len {
            index = if direction < 0 {
                if index == 0 { len - 1 } else { index - 1 }
            } else {
                (index + 1) % len
            };
            if self.items[index].selectable() {
                self.selected = index;
                break;
            }
        }
        self.adjust_scroll();
    }

    /// Keeps the selected row inside the visible window.
    fn adjust_scroll(&mut self) {
        let visible = self.config.visible_rows.max(1);
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + visible {
            self.scroll_offset = self.selected - visible + 1;
        }
    }

    async fn select_current(&mut self) -> eyre::Result<()> {
        let Some(item) = self.items.get(self.selected) else {
            return Ok(());
        };
        if !item.selectable() {
            return Ok(());
        }
        let action = item.action.clone();
        debug!("Selected {:?}", action);
        let depth = self.back_stack.len();
        action.invoke(self).await?;
        debug_assert!(
            !action.preserves_stack() || self.back_stack.len() == depth,
            "in-place action {action:?} touched the back-stack"
        );
        Ok(())
    }

    /// Forward navigation. Pushes the current screen so Back can return,
    /// except that re-entering the screen already shown (notably NowPlaying
    /// from NowPlaying) must not self-push. Actions that change no menu
    /// never come through here; see [`Action::preserves_stack`].
    fn goto(&mut self, next: Screen) {
        if self.screen != next {
            self.back_stack.push(self.screen.clone());
        }
        self.screen = next;
        self.load_screen();
    }

    fn go_back(&mut self) {
        match self.modal {
            Some(Modal::VolumeAdjust) => {
                self.modal = None;
                self.reload_screen();
            }
            Some(Modal::VideoPlaying) => {
                self.stop_video();
                self.modal = None;
                self.pop_screen();
            }
            Some(Modal::PasswordEntry) => {
                self.cancel_password_entry();
            }
            None => self.pop_screen(),
        }
    }

    /// Pops the back-stack. At the root with an empty stack this is a no-op.
    fn pop_screen(&mut self) {
        if let Some(previous) = self.back_stack.pop() {
            self.screen = previous;
            self.load_screen();
        }
    }

    /// Rebuilds `items` for the active screen after a navigation. The list
    /// is replaced wholesale and never left empty; collaborator queries that
    /// come back empty are represented by a single informational row.
    fn load_screen(&mut self) {
        // The input context is gone; any half-finished gesture goes with it.
        self.wheel.reset();
        self.rebuild_items();
        self.selected = self
            .items
            .iter()
            .position(|item| item.selectable())
            .unwrap_or(0);
        self.scroll_offset = 0;
        self.adjust_scroll();
    }

    /// Rebuilds the current screen's rows without treating it as a
    /// navigation: the selection and any in-progress wheel gesture survive.
    /// Used when a toggle or a collaborator event redraws the list in place.
    fn reload_screen(&mut self) {
        let selected = self.selected;
        let scroll_offset = self.scroll_offset;
        self.rebuild_items();
        if self.items.get(selected).is_some_and(MenuItem::selectable) {
            self.selected = selected;
            self.scroll_offset = scroll_offset.min(self.items.len() - 1);
        } else {
            self.selected = self
                .items
                .iter()
                .position(|item| item.selectable())
                .unwrap_or(0);
            self.scroll_offset = 0;
        }
        self.adjust_scroll();
    }

    fn rebuild_items(&mut self) {
        let mut items = self.build_items();
        if items.is_empty() {
            items.push(MenuItem::note("Nothing here"));
        }
        self.items = items;
    }

    fn build_items(&mut self) -> Vec<MenuItem> {
        match self.screen.clone() {
            Screen::MainMenu => vec![
                MenuItem::new("Music", Action::OpenMusic),
                MenuItem::new("Videos", Action::OpenVideos),
                MenuItem::new("Settings", Action::OpenSettings),
                MenuItem::new("Shuffle Songs", Action::PlayAllShuffle),
                MenuItem::new("Now Playing", Action::OpenNowPlaying),
            ],
            Screen::MusicMenu => vec![
                MenuItem::new("Cover Flow", Action::OpenCoverFlow),
                MenuItem::new("Artists", Action::OpenArtists),
                MenuItem::new("Albums", Action::OpenAlbums),
                MenuItem::new("Songs", Action::OpenAllSongs),
                MenuItem::new("Refresh Library", Action::RefreshLibrary),
            ],
            Screen::VideoMenu => {
                let videos = library::scan_videos(&self.config.video_dirs);
                if videos.is_empty() {
                    vec![
                        MenuItem::note("No videos found"),
                        MenuItem::note("Place video files in the videos folder"),
                        MenuItem::blank(),
                        MenuItem::new("Go back to main menu", Action::ReturnToMain),
                    ]
                } else {
                    let mut items: Vec<MenuItem> = videos
                        .into_iter()
                        .map(|path| {
                            let name = path
                                .file_stem()
                                .map(|s| s.to_string_lossy().into_owned())
                                .unwrap_or_else(|| path.to_string_lossy().into_owned());
                            MenuItem::new(
                                truncate(&name, 30),
                                Action::PlayVideo(Arc::new(path)),
                            )
                        })
                        .collect();
                    items.push(MenuItem::blank());
                    items.push(MenuItem::new("Go back to main menu", Action::ReturnToMain));
                    items
                }
            }
            Screen::ArtistList => {
                let artists = self.library.artists();
                if artists.is_empty() {
                    vec![MenuItem::note("No artists found")]
                } else {
                    artists
                        .into_iter()
                        .map(|artist| {
                            MenuItem::new(
                                artist.clone(),
                                Action::OpenSongsByArtist(artist.into()),
                            )
                        })
                        .collect()
                }
            }
            Screen::AlbumList => {
                let albums = self.library.albums();
                if albums.is_empty() {
                    vec![MenuItem::note("No albums found")]
                } else {
                    albums
                        .into_iter()
                        .map(|album| {
                            MenuItem::new(album.clone(), Action::OpenSongsByAlbum(album.into()))
                        })
                        .collect()
                }
            }
            Screen::AllSongs => song_rows(self.library.all_songs(), |song| song.artist.clone()),
            Screen::SongsByArtist(artist) => {
                song_rows(self.library.songs_by_artist(&artist), |song| {
                    song.album.clone()
                })
            }
            Screen::SongsByAlbum(album) => {
                song_rows(self.library.songs_by_album(&album), |song| {
                    song.artist.clone()
                })
            }
            Screen::NowPlaying => {
                let label = self
                    .current_song
                    .as_ref()
                    .map(|song| song.title.clone())
                    .unwrap_or_else(|| "Nothing playing".to_string());
                vec![MenuItem::note(label)]
            }
            Screen::Settings => vec![
                MenuItem::new(
                    format!("Volume: {}%", (self.volume * 100.0).round() as u32),
                    Action::AdjustVolume,
                ),
                MenuItem::new(
                    format!("Repeat: {}", self.repeat.label()),
                    Action::ToggleRepeat,
                ),
                MenuItem::new(
                    format!("Shuffle: {}", if self.shuffle { "On" } else { "Off" }),
                    Action::ToggleShuffle,
                ),
                MenuItem::new("WiFi", Action::OpenWifi),
            ],
            Screen::CoverFlow => {
                let albums = self.library.albums();
                if albums.is_empty() {
                    vec![MenuItem::note("No albums found")]
                } else {
                    albums
                        .into_iter()
                        .map(|album| {
                            MenuItem::new(album.clone(), Action::OpenSongsByAlbum(album.into()))
                        })
                        .collect()
                }
            }
            Screen::VideoPlaying(path) => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.to_string_lossy().into_owned());
                vec![
                    MenuItem::note(format!("Playing {}", truncate(&name, 30))),
                    MenuItem::blank(),
                    MenuItem::note("Menu or Escape stops playback"),
                ]
            }
            Screen::WifiMenu => {
                let status = match &self.connection {
                    Some(ssid) => format!("Connected to: {ssid}"),
                    None => "Not connected".to_string(),
                };
                let mut items = vec![
                    MenuItem::note(status),
                    MenuItem::blank(),
                    MenuItem::new("Scan for networks", Action::ScanNetworks),
                ];
                if self.connection.is_some() {
                    items.push(MenuItem::new("Disconnect", Action::DisconnectNetwork));
                }
                items
            }
            Screen::WifiNetworkList => {
                if self.scanning {
                    vec![
                        MenuItem::note("Scanning for networks..."),
                        MenuItem::note("Please wait"),
                    ]
                } else if self.networks.is_empty() {
                    vec![
                        MenuItem::note("No networks found"),
                        MenuItem::note("Check that WiFi is enabled"),
                        MenuItem::blank(),
                        MenuItem::new("Retry", Action::ScanNetworks),
                    ]
                } else {
                    let mut items: Vec<MenuItem> =
                        self.networks.iter().map(network_row).collect();
                    items.push(MenuItem::blank());
                    items.push(MenuItem::new("Rescan", Action::ScanNetworks));
                    items
                }
            }
            Screen::WifiPasswordEntry(ssid) => vec![
                MenuItem::note(format!("Network: {ssid}")),
                MenuItem::blank(),
                MenuItem::note(format!(
                    "Password: {}",
                    "\u{2022}".repeat(self.password_input.chars().count())
                )),
                MenuItem::blank(),
                MenuItem::note("Enter connects, Escape cancels"),
            ],
            Screen::WifiConnecting(ssid) => vec![
                MenuItem::note(format!("Connecting to {ssid}...")),
                MenuItem::blank(),
                MenuItem::note("Please wait..."),
            ],
        }
    }

    async fn toggle_playback(&mut self) -> eyre::Result<()> {
        if self.playing && !self.paused {
            self.audio_command_tx.send(AudioCommand::Pause).await?;
            self.paused = true;
        } else if self.paused {
            self.audio_command_tx.send(AudioCommand::Play).await?;
            self.paused = false;
            self.playing = true;
        } else if self.current_song.is_some() {
            self.audio_command_tx.send(AudioCommand::Play).await?;
            self.playing = true;
        } else {
            // Nothing loaded yet: start at the top of the library.
            let songs = self.library.all_songs();
            if songs.is_empty() {
                self.status = Some("No songs to play".to_string());
                return Ok(());
            }
            self.playlist = songs;
            self.start_song_at(0).await?;
            if self.current_song.is_some() {
                self.goto(Screen::NowPlaying);
            }
        }
        Ok(())
    }

    async fn forward_pressed(&mut self) -> eyre::Result<()> {
        match self.screen {
            Screen::NowPlaying => self.next_song().await,
            Screen::CoverFlow => {
                self.move_selection(1);
                Ok(())
            }
            Screen::Settings if self.volume_row_selected() => {
                enter_volume_adjust(self, self.config.volume_step).await
            }
            _ => Ok(()),
        }
    }

    async fn backward_pressed(&mut self) -> eyre::Result<()> {
        match self.screen {
            Screen::NowPlaying => self.previous_song().await,
            Screen::CoverFlow => {
                self.move_selection(-1);
                Ok(())
            }
            Screen::Settings if self.volume_row_selected() => {
                enter_volume_adjust(self, -self.config.volume_step).await
            }
            _ => Ok(()),
        }
    }

    fn volume_row_selected(&self) -> bool {
        self.items
            .get(self.selected)
            .is_some_and(|item| item.action == Action::AdjustVolume)
    }

    async fn nudge_volume(&mut self, delta: f32) -> eyre::Result<()> {
        let target = (self.volume + delta).clamp(0.0, 1.0);
        self.audio_command_tx
            .send(AudioCommand::SetVolume(target))
            .await?;
        Ok(())
    }

    /// Starts `playlist[index]`. A song whose file vanished keeps the
    /// current screen and leaves a status message instead of navigating.
    async fn start_song_at(&mut self, index: usize) -> eyre::Result<()> {
        let Some(song) = self.playlist.get(index).cloned() else {
            return Ok(());
        };
        if !song.path.exists() {
            warn!("Song file missing: {:?}", song.path);
            self.status = Some(format!("Can't play {}", song.title));
            self.audio_command_tx.send(AudioCommand::Stop).await?;
            self.playing = false;
            self.paused = false;
            self.current_song = None;
            return Ok(());
        }
        let duration = (song.duration_secs > 0.0)
            .then(|| Duration::from_secs_f64(song.duration_secs));
        self.audio_command_tx
            .send(AudioCommand::Load {
                path: song.path.clone(),
                duration,
            })
            .await?;
        self.audio_command_tx.send(AudioCommand::Play).await?;
        self.playlist_index = Some(index);
        self.song_duration_secs = song.duration_secs;
        self.current_song = Some(song);
        self.position_secs = 0.0;
        self.playing = true;
        self.paused = false;
        Ok(())
    }

    async fn next_song(&mut self) -> eyre::Result<()> {
        let len = self.playlist.len();
        let Some(index) = self.playlist_index else {
            return Ok(());
        };
        if len == 0 {
            return Ok(());
        }
        let next = if self.shuffle && len > 1 {
            other_random_index(index, len)
        } else {
            (index + 1) % len
        };
        self.start_song_at(next).await
    }

    async fn previous_song(&mut self) -> eyre::Result<()> {
        let len = self.playlist.len();
        let Some(index) = self.playlist_index else {
            return Ok(());
        };
        if len == 0 {
            return Ok(());
        }
        // A few seconds in, "previous" means restart the current song.
        if self.position_secs > 3.0 {
            return self.start_song_at(index).await;
        }
        let previous = if self.shuffle && len > 1 {
            other_random_index(index, len)
        } else if index == 0 {
            len - 1
        } else {
            index - 1
        };
        self.start_song_at(previous).await
    }

    /// Reacts to the player reaching the end of the loaded song.
    async fn song_finished(&mut self) -> eyre::Result<()> {
        self.playing = false;
        self.paused = false;
        self.position_secs = 0.0;
        let len = self.playlist.len();
        let Some(index) = self.playlist_index else {
            self.current_song = None;
            return Ok(());
        };
        if len == 0 {
            self.current_song = None;
            return Ok(());
        }
        match self.repeat {
            RepeatMode::One => self.start_song_at(index).await,
            _ if self.shuffle => {
                let next = if len > 1 {
                    other_random_index(index, len)
                } else {
                    0
                };
                self.start_song_at(next).await
            }
            RepeatMode::All => self.start_song_at((index + 1) % len).await,
            RepeatMode::Off => {
                if index + 1 < len {
                    self.start_song_at(index + 1).await
                } else {
                    self.current_song = None;
                    self.audio_command_tx.send(AudioCommand::Stop).await?;
                    Ok(())
                }
            }
        }
    }

    fn stop_video(&mut self) {
        if let Some(mut child) = self.video.take() {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to stop video player");
            }
        }
    }

    async fn render(&mut self) -> eyre::Result<()> {
        let frame = self.compose_frame();
        self.ui_command_tx.send(UiCommand::Render(frame)).await?;
        Ok(())
    }

    fn compose_frame(&self) -> Frame {
        let visible = self.config.visible_rows.max(1);
        let rows: Vec<Row> = self
            .items
            .iter()
            .skip(self.scroll_offset)
            .take(visible)
            .map(|item| Row {
                label: item.label.clone(),
                sublabel: item.sublabel.clone(),
                selectable: item.selectable(),
            })
            .pad(visible, Row::default())
            .collect();
        let selected = (self.selected >= self.scroll_offset
            && self.selected < self.scroll_offset + visible
            && self
                .items
                .get(self.selected)
                .is_some_and(|item| item.selectable()))
        .then(|| self.selected - self.scroll_offset);
        let now_playing = self.current_song.as_ref().map(|song| NowPlayingLine {
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            position_secs: self.position_secs,
            duration_secs: self.song_duration_secs,
            playing: self.playing && !self.paused,
            paused: self.paused,
            playlist_position: self.playlist_index.map(|i| (i, self.playlist.len())),
        });
        Frame {
            title: self.screen.title(),
            rows,
            selected,
            now_playing,
            status: self.status.clone(),
        }
    }
}

fn song_rows(
    songs: Vec<Arc<Song>>,
    sublabel: impl Fn(&Song) -> String,
) -> Vec<MenuItem> {
    if songs.is_empty() {
        return vec![MenuItem::note("No songs found")];
    }
    songs
        .into_iter()
        .map(|song| {
            let label = song.title.clone();
            let sub = sublabel(&song);
            MenuItem::new(label, Action::PlaySong(song)).with_sublabel(sub)
        })
        .collect()
}

fn network_row(network: &Arc<WifiNetwork>) -> MenuItem {
    let mut label = format!(
        "{} {}",
        truncate(&network.ssid, 20),
        signal_bars(network.signal)
    );
    if secured(network) {
        label.push_str(" \u{1F512}");
    }
    if network.connected {
        label.push_str(" \u{2713}");
    }
    let action = if network.connected {
        Action::DisconnectNetwork
    } else {
        Action::ConnectNetwork(network.clone())
    };
    MenuItem::new(label.trim_end().to_string(), action)
}

fn secured(network: &WifiNetwork) -> bool {
    let security = network.security.to_uppercase();
    security.contains("WPA") || security.contains("WEP")
}

fn signal_bars(signal: u8) -> &'static str {
    match signal {
        81..=100 => "\u{25CF}\u{25CF}\u{25CF}\u{25CF}\u{25CF}",
        61..=80 => "\u{25CF}\u{25CF}\u{25CF}\u{25CF}\u{25CB}",
        41..=60 => "\u{25CF}\u{25CF}\u{25CF}\u{25CB}\u{25CB}",
        21..=40 => "\u{25CF}\u{25CF}\u{25CB}\u{25CB}\u{25CB}",
        _ => "\u{25CF}\u{25CB}\u{25CB}\u{25CB}\u{25CB}",
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(2)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn other_random_index(current: usize, len: usize) -> usize {
    let mut rng = rand::rng();
    let mut next = current;
    while next == current {
        next = rng.random_range(0..len);
    }
    next
}

async fn open_music(nav: &mut Navigator) -> eyre::Result<()> {
    nav.goto(Screen::MusicMenu);
    Ok(())
}

async fn open_videos(nav: &mut Navigator) -> eyre::Result<()> {
    nav.goto(Screen::VideoMenu);
    Ok(())
}

async fn open_settings(nav: &mut Navigator) -> eyre::Result<()> {
    nav.goto(Screen::Settings);
    Ok(())
}

async fn open_cover_flow(nav: &mut Navigator) -> eyre::Result<()> {
    nav.goto(Screen::CoverFlow);
    Ok(())
}

async fn open_artists(nav: &mut Navigator) -> eyre::Result<()> {
    nav.goto(Screen::ArtistList);
    Ok(())
}

async fn open_albums(nav: &mut Navigator) -> eyre::Result<()> {
    nav.goto(Screen::AlbumList);
    Ok(())
}

async fn open_all_songs(nav: &mut Navigator) -> eyre::Result<()> {
    nav.goto(Screen::AllSongs);
    Ok(())
}

async fn open_songs_by_artist(nav: &mut Navigator, artist: Arc<str>) -> eyre::Result<()> {
    nav.goto(Screen::SongsByArtist(artist));
    Ok(())
}

async fn open_songs_by_album(nav: &mut Navigator, album: Arc<str>) -> eyre::Result<()> {
    nav.goto(Screen::SongsByAlbum(album));
    Ok(())
}

/// Selecting a song makes the surrounding list the active playlist.
async fn play_song(nav: &mut Navigator, song: Arc<Song>) -> eyre::Result<()> {
    if !song.path.exists() {
        warn!("Song file missing: {:?}", song.path);
        nav.status = Some(format!("Can't play {}", song.title));
        return Ok(());
    }
    nav.playlist = nav
        .items
        .iter()
        .filter_map(|item| match &item.action {
            Action::PlaySong(s) => Some(s.clone()),
            _ => None,
        })
        .collect();
    let index = match nav.playlist.iter().position(|s| s.id == song.id) {
        Some(index) => index,
        None => {
            nav.playlist = vec![song.clone()];
            0
        }
    };
    nav.start_song_at(index).await?;
    if nav.current_song.is_some() {
        nav.goto(Screen::NowPlaying);
    }
    Ok(())
}

async fn play_video(nav: &mut Navigator, path: Arc<PathBuf>) -> eyre::Result<()> {
    match tokio::process::Command::new("mpv")
        .arg("--fullscreen")
        .arg(&**path)
        .spawn()
    {
        Ok(child) => {
            nav.stop_video();
            nav.video = Some(child);
            nav.modal = Some(Modal::VideoPlaying);
            nav.goto(Screen::VideoPlaying(path));
        }
        Err(e) => {
            warn!(error = %e, "Unable to start video player");
            nav.status = Some(format!("Unable to start video player: {e}"));
        }
    }
    Ok(())
}

async fn play_all_shuffle(nav: &mut Navigator) -> eyre::Result<()> {
    use rand::seq::SliceRandom;
    let mut songs = nav.library.all_songs();
    if songs.is_empty() {
        nav.status = Some("No songs to play".to_string());
        return Ok(());
    }
    songs.shuffle(&mut rand::rng());
    nav.playlist = songs;
    nav.shuffle = true;
    nav.start_song_at(0).await?;
    if nav.current_song.is_some() {
        nav.goto(Screen::NowPlaying);
    }
    Ok(())
}

async fn open_now_playing(nav: &mut Navigator) -> eyre::Result<()> {
    if nav.current_song.is_none() {
        let songs = nav.library.all_songs();
        if songs.is_empty() {
            nav.status = Some("No songs to play".to_string());
            return Ok(());
        }
        nav.playlist = songs;
        nav.start_song_at(0).await?;
        if nav.current_song.is_none() {
            return Ok(());
        }
    }
    nav.goto(Screen::NowPlaying);
    Ok(())
}

async fn toggle_repeat(nav: &mut Navigator) -> eyre::Result<()> {
    nav.repeat = nav.repeat.cycle();
    nav.reload_screen();
    Ok(())
}

async fn toggle_shuffle(nav: &mut Navigator) -> eyre::Result<()> {
    nav.shuffle = !nav.shuffle;
    nav.reload_screen();
    Ok(())
}

async fn enter_volume_adjust(nav: &mut Navigator, delta: f32) -> eyre::Result<()> {
    nav.modal = Some(Modal::VolumeAdjust);
    if delta != 0.0 {
        nav.nudge_volume(delta).await?;
    }
    nav.reload_screen();
    Ok(())
}

async fn refresh_library(nav: &mut Navigator) -> eyre::Result<()> {
    match nav.library.rescan() {
        Ok(count) => {
            nav.status = Some(format!("Library updated: {count} songs"));
        }
        Err(e) => {
            warn!(error = %e, "Library rescan failed");
            nav.status = Some("Library update failed".to_string());
        }
    }
    nav.reload_screen();
    Ok(())
}

async fn open_wifi(nav: &mut Navigator) -> eyre::Result<()> {
    nav.net_command_tx.send(NetCommand::Status).await?;
    nav.goto(Screen::WifiMenu);
    Ok(())
}

async fn scan_networks(nav: &mut Navigator) -> eyre::Result<()> {
    nav.scanning = true;
    nav.net_command_tx.send(NetCommand::Scan).await?;
    nav.goto(Screen::WifiNetworkList);
    Ok(())
}

async fn connect_network(nav: &mut Navigator, network: Arc<WifiNetwork>) -> eyre::Result<()> {
    let ssid: Arc<str> = network.ssid.as_str().into();
    if secured(&network) {
        nav.password_input.clear();
        nav.modal = Some(Modal::PasswordEntry);
        nav.goto(Screen::WifiPasswordEntry(ssid));
    } else {
        nav.net_command_tx
            .send(NetCommand::Connect {
                ssid: ssid.clone(),
                password: String::new(),
            })
            .await?;
        nav.goto(Screen::WifiConnecting(ssid));
    }
    Ok(())
}

async fn disconnect_network(nav: &mut Navigator) -> eyre::Result<()> {
    nav.net_command_tx.send(NetCommand::Disconnect).await?;
    nav.connection = None;
    nav.networks = nav
        .networks
        .iter()
        .map(|n| {
            let mut network = (**n).clone();
            network.connected = false;
            Arc::new(network)
        })
        .collect();
    nav.reload_screen();
    Ok(())
}

async fn return_to_main(nav: &mut Navigator) -> eyre::Result<()> {
    nav.back_stack.clear();
    nav.screen = Screen::MainMenu;
    nav.load_screen();
    Ok(())
}
