use crate::config::Config;
use crate::daemon::library::{FsLibrary, Library};
use crate::daemon::ui::Navigator;
use eyre::Context;
use std::sync::Arc;
use tracing::{info, warn};

pub mod audio;
mod console;
pub mod library;
pub mod net;
pub mod ui;
pub mod wheel;

#[tracing::instrument(skip_all)]
pub async fn run(config: Config) -> eyre::Result<()> {
    let config = Arc::new(config);

    info!("Scanning music library");
    let dirs = config.music_dirs.clone();
    let (library, song_count) = tokio::task::spawn_blocking(move || {
        let mut library = FsLibrary::new(dirs);
        let count = library.rescan()?;
        Ok::<_, eyre::Report>((library, count))
    })
    .await
    .context("Library scan task failed")??;
    info!("Found {} songs", song_count);

    let (
        mut navigator,
        ui_event_tx,
        ui_command_rx,
        audio_event_tx,
        audio_command_rx,
        net_event_tx,
        net_command_rx,
    ) = Navigator::new(config.clone(), Box::new(library));
    navigator.init().await?;

    let navigator_finished = tokio::spawn(navigator.run());
    let audio_finished = tokio::spawn(audio::run(
        config.initial_volume,
        audio_event_tx,
        audio_command_rx,
    ));
    let net_finished = tokio::spawn(net::run(net_event_tx, net_command_rx));
    let console_finished = tokio::spawn(console::run(ui_event_tx.clone(), ui_command_rx));

    let sigint = tokio::signal::ctrl_c();
    tokio::pin!(sigint);

    tokio::select! {
        result = navigator_finished => {
            result.context("Navigator task panicked")??;
            info!("Navigator finished, shutting down");
        },
        sigint_result = &mut sigint => {
            match sigint_result {
                Ok(_) => info!("Received SIGINT, shutting down gracefully"),
                Err(e) => warn!(error = %e, "Error waiting for SIGINT"),
            }
        }
    }

    // Dropping the last input sender unblocks any task still waiting on its
    // channel; the audio worker stops its sink when the command side closes.
    drop(ui_event_tx);
    console_finished.abort();
    net_finished.abort();
    match audio_finished.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Audio service ended with an error"),
        Err(e) => {
            if !e.is_cancelled() {
                warn!(error = %e, "Audio task panicked");
            }
        }
    }

    Ok(())
}

/// `podwheel scan`: rebuild the index once and print what was found.
#[tracing::instrument(skip_all)]
pub async fn scan(config: Config) -> eyre::Result<()> {
    let dirs = config.music_dirs.clone();
    let library = tokio::task::spawn_blocking(move || {
        let mut library = FsLibrary::new(dirs);
        library.rescan()?;
        Ok::<_, eyre::Report>(library)
    })
    .await
    .context("Library scan task failed")??;

    let songs = library.all_songs();
    println!(
        "{} songs, {} artists, {} albums",
        songs.len(),
        library.artists().len(),
        library.albums().len()
    );
    for song in songs {
        println!(
            "{} - {} ({}) [{}]",
            song.artist,
            song.title,
            song.album,
            format_duration(song.duration_secs)
        );
    }
    Ok(())
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
