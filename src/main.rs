use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(version, about, author)]
struct Cli {
    /// Path to the configuration file. A missing file falls back to defaults.
    #[arg(long, default_value = "podwheel.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Eq, PartialEq, Subcommand, Clone)]
enum Commands {
    /// Run the player.
    Daemon,
    /// Rebuild the song index and print a summary.
    Scan,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .init();
    stable_eyre::install()?;

    let cli = Cli::parse();
    tracing::debug!("Parsed command line arguments {:?}", &cli);

    let config = config::load(&cli.config)?;

    match &cli.command {
        Some(Commands::Scan) => {
            daemon::scan(config).await?;
        }
        Some(Commands::Daemon) | None => {
            daemon::run(config).await?;
        }
    }

    Ok(())
}

mod daemon;
mod util;

mod config {
    use crate::daemon::wheel::WheelButton;
    use eyre::Context;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(default)]
    pub struct Config {
        pub wheel: WheelConfig,
        /// Number of list rows visible at once on the screen.
        pub visible_rows: usize,
        pub music_dirs: Vec<PathBuf>,
        pub video_dirs: Vec<PathBuf>,
        pub initial_volume: f32,
        pub volume_step: f32,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(default)]
    pub struct WheelConfig {
        pub center_x: f32,
        pub center_y: f32,
        pub center_radius: f32,
        pub outer_radius: f32,
        pub scroll_threshold_deg: f32,
        /// Angular sectors of the ring and the logical button each one
        /// triggers. Ranges with `start_deg > end_deg` wrap through 0/360.
        pub quadrants: Vec<Quadrant>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Quadrant {
        pub start_deg: f32,
        pub end_deg: f32,
        pub button: WheelButton,
    }

    impl Default for Config {
        fn default() -> Self {
            Config {
                wheel: WheelConfig::default(),
                visible_rows: 6,
                music_dirs: vec![PathBuf::from("music")],
                video_dirs: vec![PathBuf::from("videos")],
                initial_volume: 0.7,
                volume_step: 0.05,
            }
        }
    }

    impl Default for WheelConfig {
        fn default() -> Self {
            // Screen coordinates grow downward, so the 60..120 sector sits at
            // the bottom of the ring and 240..300 at the top.
            WheelConfig {
                center_x: 179.0,
                center_y: 81.0,
                center_radius: 30.0,
                outer_radius: 75.0,
                scroll_threshold_deg: 15.0,
                quadrants: vec![
                    Quadrant {
                        start_deg: 240.0,
                        end_deg: 300.0,
                        button: WheelButton::Menu,
                    },
                    Quadrant {
                        start_deg: 60.0,
                        end_deg: 120.0,
                        button: WheelButton::PlayPause,
                    },
                    Quadrant {
                        start_deg: 160.0,
                        end_deg: 200.0,
                        button: WheelButton::Backward,
                    },
                    Quadrant {
                        start_deg: 340.0,
                        end_deg: 20.0,
                        button: WheelButton::Forward,
                    },
                ],
            }
        }
    }

    pub fn load(path: &Path) -> eyre::Result<Config> {
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }
}
