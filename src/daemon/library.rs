//! The local song index.
//!
//! Songs are discovered by walking the configured music directories and
//! probing each file's tags and duration. The index lives in memory; queries
//! are cheap clones served synchronously to the navigator.

use eyre::Context;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a", "aac"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: u64,
    pub path: Arc<PathBuf>,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: f64,
}

/// Query surface the navigator consumes. Tests substitute a fixture.
pub trait Library: Send {
    fn artists(&self) -> Vec<String>;
    fn albums(&self) -> Vec<String>;
    fn songs_by_artist(&self, artist: &str) -> Vec<Arc<Song>>;
    fn songs_by_album(&self, album: &str) -> Vec<Arc<Song>>;
    fn all_songs(&self) -> Vec<Arc<Song>>;
    /// Rebuilds the index from disk. Returns the number of songs found.
    fn rescan(&mut self) -> eyre::Result<usize>;
}

pub struct FsLibrary {
    dirs: Vec<PathBuf>,
    songs: Vec<Arc<Song>>,
}

impl FsLibrary {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        FsLibrary {
            dirs,
            songs: Vec::new(),
        }
    }
}

impl Library for FsLibrary {
    fn artists(&self) -> Vec<String> {
        distinct(self.songs.iter().map(|s| s.artist.as_str()))
    }

    fn albums(&self) -> Vec<String> {
        distinct(self.songs.iter().map(|s| s.album.as_str()))
    }

    fn songs_by_artist(&self, artist: &str) -> Vec<Arc<Song>> {
        self.songs
            .iter()
            .filter(|s| s.artist.eq_ignore_ascii_case(artist))
            .cloned()
            .collect()
    }

    fn songs_by_album(&self, album: &str) -> Vec<Arc<Song>> {
        self.songs
            .iter()
            .filter(|s| s.album.eq_ignore_ascii_case(album))
            .cloned()
            .collect()
    }

    fn all_songs(&self) -> Vec<Arc<Song>> {
        self.songs.clone()
    }

    #[tracing::instrument(skip(self))]
    fn rescan(&mut self) -> eyre::Result<usize> {
        let mut songs = Vec::new();
        for dir in &self.dirs {
            if !dir.is_dir() {
                debug!("Skipping missing music directory {:?}", dir);
                continue;
            }
            for entry in WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !entry.file_type().is_file() || !has_extension(path, AUDIO_EXTENSIONS) {
                    continue;
                }
                let id = songs.len() as u64;
                let song = match probe_song(path, id) {
                    Ok(song) => song,
                    Err(e) => {
                        warn!(error = %e, "Unreadable tags in {:?}, indexing by file name", path);
                        fallback_song(path, id)
                    }
                };
                songs.push(Arc::new(song));
            }
        }
        songs.sort_by(|a, b| {
            (a.artist.to_lowercase(), a.album.to_lowercase(), &a.title)
                .cmp(&(b.artist.to_lowercase(), b.album.to_lowercase(), &b.title))
        });
        info!("Indexed {} songs from {} directories", songs.len(), self.dirs.len());
        self.songs = songs;
        Ok(self.songs.len())
    }
}

/// Files in the configured video directories, sorted by name.
pub fn scan_videos(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut videos: Vec<PathBuf> = dirs
        .iter()
        .filter(|d| d.is_dir())
        .flat_map(|dir| {
            WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && has_extension(e.path(), VIDEO_EXTENSIONS))
                .map(|e| e.into_path())
        })
        .collect();
    videos.sort();
    videos
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn probe_song(path: &Path, id: u64) -> eyre::Result<Song> {
    let file = File::open(path).with_context(|| format!("Unable to open {:?}", path))?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Unable to probe {:?}", path))?;
    let mut format = probed.format;

    let mut title = None;
    let mut artist = None;
    let mut album = None;
    if let Some(revision) = format.metadata().current() {
        for tag in revision.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) if title.is_none() => title = tag_text(tag),
                Some(StandardTagKey::Artist) if artist.is_none() => artist = tag_text(tag),
                Some(StandardTagKey::Album) if album.is_none() => album = tag_text(tag),
                _ => {}
            }
        }
    }

    let duration_secs = format
        .default_track()
        .and_then(|track| {
            let params = &track.codec_params;
            let frames = params.n_frames?;
            let rate = params.sample_rate.filter(|r| *r > 0)?;
            Some(frames as f64 / rate as f64)
        })
        .unwrap_or(0.0);

    Ok(Song {
        id,
        path: Arc::new(path.to_path_buf()),
        title: title.unwrap_or_else(|| stem_title(path)),
        artist: artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        album: album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
        duration_secs,
    })
}

fn fallback_song(path: &Path, id: u64) -> Song {
    Song {
        id,
        path: Arc::new(path.to_path_buf()),
        title: stem_title(path),
        artist: UNKNOWN_ARTIST.to_string(),
        album: UNKNOWN_ALBUM.to_string(),
        duration_secs: 0.0,
    }
}

fn stem_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn tag_text(tag: &Tag) -> Option<String> {
    let value = tag.value.to_string();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Case-insensitive dedup preserving first-seen capitalization, sorted.
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(value)) {
            out.push(value.to_string());
        }
    }
    out.sort_by_key(|v| v.to_lowercase());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_is_case_insensitive_and_sorted() {
        let values = ["Beta", "alpha", "BETA", "Gamma", "beta"];
        assert_eq!(
            distinct(values.into_iter()),
            vec!["alpha".to_string(), "Beta".to_string(), "Gamma".to_string()]
        );
    }

    #[test]
    fn extension_match_ignores_case() {
        assert!(has_extension(Path::new("a/b.MP3"), AUDIO_EXTENSIONS));
        assert!(has_extension(Path::new("a/b.flac"), AUDIO_EXTENSIONS));
        assert!(!has_extension(Path::new("a/b.txt"), AUDIO_EXTENSIONS));
        assert!(!has_extension(Path::new("a/mp3"), AUDIO_EXTENSIONS));
    }

    #[test]
    fn fallback_song_uses_the_file_stem() {
        let song = fallback_song(Path::new("/music/Blue Danube.mp3"), 7);
        assert_eq!(song.title, "Blue Danube");
        assert_eq!(song.artist, UNKNOWN_ARTIST);
        assert_eq!(song.id, 7);
    }
}
