use crate::daemon::library::Song;
use crate::daemon::net::WifiNetwork;
use crate::daemon::ui::{
    Navigator, connect_network, disconnect_network, enter_volume_adjust, open_albums,
    open_all_songs, open_artists, open_cover_flow, open_music, open_now_playing, open_settings,
    open_songs_by_album, open_songs_by_artist, open_videos, open_wifi, play_all_shuffle,
    play_song, play_video, refresh_library, return_to_main, scan_networks, toggle_repeat,
    toggle_shuffle,
};
use std::path::PathBuf;
use std::sync::Arc;

/// What selecting a row does. `None` marks a non-interactive row (dividers,
/// placeholder text) that selection movement skips over.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Action {
    #[default]
    None,
    OpenMusic,
    OpenVideos,
    OpenSettings,
    OpenCoverFlow,
    OpenArtists,
    OpenAlbums,
    OpenAllSongs,
    OpenSongsByArtist(Arc<str>),
    OpenSongsByAlbum(Arc<str>),
    PlaySong(Arc<Song>),
    PlayVideo(Arc<PathBuf>),
    PlayAllShuffle,
    OpenNowPlaying,
    ToggleRepeat,
    ToggleShuffle,
    AdjustVolume,
    RefreshLibrary,
    OpenWifi,
    ScanNetworks,
    ConnectNetwork(Arc<WifiNetwork>),
    DisconnectNetwork,
    ReturnToMain,
}

impl Action {
    /// Actions that adjust state in place and must never touch the
    /// back-stack, per the navigation policy.
    pub(in crate::daemon::ui) fn preserves_stack(&self) -> bool {
        matches!(
            self,
            Action::ToggleRepeat
                | Action::ToggleShuffle
                | Action::AdjustVolume
                | Action::RefreshLibrary
        )
    }

    pub(in crate::daemon::ui) async fn invoke(&self, nav: &mut Navigator) -> eyre::Result<()> {
        match self {
            Action::None => Ok(()),
            Action::OpenMusic => open_music(nav).await,
            Action::OpenVideos => open_videos(nav).await,
            Action::OpenSettings => open_settings(nav).await,
            Action::OpenCoverFlow => open_cover_flow(nav).await,
            Action::OpenArtists => open_artists(nav).await,
            Action::OpenAlbums => open_albums(nav).await,
            Action::OpenAllSongs => open_all_songs(nav).await,
            Action::OpenSongsByArtist(artist) => open_songs_by_artist(nav, artist.clone()).await,
            Action::OpenSongsByAlbum(album) => open_songs_by_album(nav, album.clone()).await,
            Action::PlaySong(song) => play_song(nav, song.clone()).await,
            Action::PlayVideo(path) => play_video(nav, path.clone()).await,
            Action::PlayAllShuffle => play_all_shuffle(nav).await,
            Action::OpenNowPlaying => open_now_playing(nav).await,
            Action::ToggleRepeat => toggle_repeat(nav).await,
            Action::ToggleShuffle => toggle_shuffle(nav).await,
            Action::AdjustVolume => enter_volume_adjust(nav, 0.0).await,
            Action::RefreshLibrary => refresh_library(nav).await,
            Action::OpenWifi => open_wifi(nav).await,
            Action::ScanNetworks => scan_networks(nav).await,
            Action::ConnectNetwork(network) => connect_network(nav, network.clone()).await,
            Action::DisconnectNetwork => disconnect_network(nav).await,
            Action::ReturnToMain => return_to_main(nav).await,
        }
    }
}

/// One row of the active list. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub label: String,
    pub sublabel: Option<String>,
    pub action: Action,
}

impl MenuItem {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        MenuItem {
            label: label.into(),
            sublabel: None,
            action,
        }
    }

    pub fn with_sublabel(mut self, sublabel: impl Into<String>) -> Self {
        self.sublabel = Some(sublabel.into());
        self
    }

    /// Non-interactive informational row.
    pub fn note(label: impl Into<String>) -> Self {
        MenuItem::new(label, Action::None)
    }

    /// Empty spacer row.
    pub fn blank() -> Self {
        MenuItem::note("")
    }

    pub fn selectable(&self) -> bool {
        self.action != Action::None
    }
}
