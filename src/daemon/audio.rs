//! Audio playback service.
//!
//! rodio wants to live on a plain thread, so the async side translates
//! commands onto a blocking channel and a `spawn_blocking` worker owns the
//! output stream and the single active sink. A periodic tick drives position
//! reporting and end-of-song detection; the resulting events are the only
//! way playback state reaches the navigator.

use crate::daemon::audio::BlockingPlayerCommand::AsyncCommand;
use eyre::Context;
use rodio::decoder::DecoderBuilder;
use rodio::{OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, trace};

#[derive(Debug, Clone)]
pub enum AudioCommand {
    Load {
        path: Arc<PathBuf>,
        /// Duration from the library index; used when the decoder cannot
        /// report one itself.
        duration: Option<Duration>,
    },
    Play,
    Pause,
    Stop,
    SetVolume(f32),
}

#[derive(Debug, Clone)]
pub enum AudioEvent {
    Loaded {
        path: Arc<PathBuf>,
        duration: Option<Duration>,
    },
    LoadFailed {
        path: Arc<PathBuf>,
        reason: String,
    },
    Progress {
        position: Duration,
    },
    Finished,
    VolumeChanged(f32),
}

enum BlockingPlayerCommand {
    AsyncCommand(AudioCommand),
    UpdateState,
}

struct PlayerState {
    stream: OutputStream,
    sink: Option<Sink>,
    volume: f32,
    event_tx: Sender<AudioEvent>,
}

impl PlayerState {
    fn new(initial_volume: f32, event_tx: Sender<AudioEvent>) -> eyre::Result<Self> {
        let stream = rodio::OutputStreamBuilder::open_default_stream()
            .context("Unable to create audio device")?;
        Ok(PlayerState {
            stream,
            sink: None,
            volume: initial_volume.clamp(0.0, 1.0),
            event_tx,
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn load(&mut self, path: Arc<PathBuf>, duration: Option<Duration>) -> eyre::Result<()> {
        if let Some(old) = self.sink.take() {
            old.stop();
        }

        let file =
            File::open(&*path).with_context(|| format!("Unable to open {:?}", &path))?;
        let file_len = file.metadata()?.len();
        let mut decoder = DecoderBuilder::new()
            .with_data(BufReader::with_capacity(512 * 1024, file))
            .with_byte_len(file_len)
            .with_gapless(true)
            .with_seekable(true);
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            decoder = decoder.with_hint(ext);
        }
        let source = decoder
            .build()
            .with_context(|| format!("Unable to decode {:?}", &path))?;
        let duration = source.total_duration().or(duration);

        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_volume(self.volume);
        sink.pause();
        sink.append(source);
        self.sink = Some(sink);

        self.event_tx
            .blocking_send(AudioEvent::Loaded { path, duration })?;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> eyre::Result<()> {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
        self.event_tx
            .blocking_send(AudioEvent::VolumeChanged(self.volume))?;
        Ok(())
    }

    fn update(&mut self) -> eyre::Result<()> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };
        if sink.empty() {
            self.sink = None;
            self.event_tx.blocking_send(AudioEvent::Finished)?;
        } else if !sink.is_paused() {
            self.event_tx.blocking_send(AudioEvent::Progress {
                position: sink.get_pos(),
            })?;
        }
        Ok(())
    }

    #[instrument(skip_all, level = "debug")]
    fn shutdown(self) {
        if let Some(sink) = self.sink {
            sink.stop();
        }
    }
}

pub async fn run(
    initial_volume: f32,
    event_tx: Sender<AudioEvent>,
    mut command_rx: Receiver<AudioCommand>,
) -> eyre::Result<()> {
    let (blocking_cmd_tx, blocking_cmd_rx) = std::sync::mpsc::channel::<BlockingPlayerCommand>();
    let interrupt_task = tokio::task::spawn(async move {
        let mut timeout = tokio::time::interval(Duration::from_millis(500));
        timeout.set_missed_tick_behavior(MissedTickBehavior::Delay);
        'task: loop {
            tokio::select! {
                command = command_rx.recv() => {
                    let Some(command) = command else {
                        trace!("Audio command channel closed, shutting down translation loop");
                        break 'task;
                    };
                    if blocking_cmd_tx.send(AsyncCommand(command)).is_err() {
                        trace!("Blocking player channel closed, shutting down translation loop (a)");
                        break 'task;
                    }
                },
                _ = timeout.tick() => {
                    trace!("ask for player state update");
                    if blocking_cmd_tx.send(BlockingPlayerCommand::UpdateState).is_err() {
                        trace!("Blocking player channel closed, shutting down translation loop (i)");
                        break 'task;
                    }
                }
            }
        }
    });

    let sync_thread_finished =
        tokio::task::spawn_blocking(move || run_sync(initial_volume, event_tx, blocking_cmd_rx));

    sync_thread_finished.await??;
    interrupt_task.await?;
    Ok(())
}

#[instrument(skip_all)]
fn run_sync(
    initial_volume: f32,
    event_tx: Sender<AudioEvent>,
    command_rx: std::sync::mpsc::Receiver<BlockingPlayerCommand>,
) -> eyre::Result<()> {
    let mut state = PlayerState::new(initial_volume, event_tx)?;
    while let Ok(command) = command_rx.recv() {
        match command {
            AsyncCommand(AudioCommand::Load { path, duration }) => {
                if let Err(e) = state.load(path.clone(), duration) {
                    error!("Error loading track: {:?}", e);
                    state
                        .event_tx
                        .blocking_send(AudioEvent::LoadFailed {
                            path,
                            reason: e.to_string(),
                        })?;
                }
            }
            AsyncCommand(AudioCommand::Play) => {
                if let Some(sink) = &state.sink {
                    sink.play();
                }
            }
            AsyncCommand(AudioCommand::Pause) => {
                if let Some(sink) = &state.sink {
                    sink.pause();
                }
            }
            AsyncCommand(AudioCommand::Stop) => {
                if let Some(sink) = state.sink.take() {
                    sink.stop();
                }
            }
            AsyncCommand(AudioCommand::SetVolume(volume)) => {
                state.set_volume(volume)?;
            }
            BlockingPlayerCommand::UpdateState => {
                state.update()?;
            }
        }
    }

    info!("Audio command channel closed, shutting down");
    state.shutdown();
    Ok(())
}
