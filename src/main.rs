use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tinsel::config;
use tinsel::gesture::classify;
use tinsel::scene::LogRenderer;
use tinsel::sys::FrameSource;
use tinsel::sys::replay::Recording;
use tinsel::sys::runtime;

#[derive(Parser, Debug)]
#[command(name = "tinsel", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Render rate in frames per second (overrides the config)
    #[arg(long, global = true)]
    fps: Option<u32>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Play back a recorded landmark file
    Replay {
        file: PathBuf,

        /// Start over when the recording ends
        #[arg(long = "loop")]
        looping: bool,
    },
    /// Accept landmark frames from an external tracker over a unix socket
    Listen {
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },
    /// Write the default config file and print its path
    Config,
    /// Print the gesture of every frame in a recording
    Classify { file: PathBuf },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = config::load_or_default();
    if let Some(fps) = cli.fps {
        config.runtime.render_hz = fps;
    }

    match cli.command {
        Commands::Replay { file, looping } => {
            let source = FrameSource::Replay {
                path: file,
                looping,
            };
            runtime::block_on(config, source, LogRenderer::default())?;
        }
        Commands::Listen { socket } => {
            let path = socket.unwrap_or_else(|| config.runtime.socket.clone());
            runtime::block_on(config, FrameSource::Socket { path }, LogRenderer::default())?;
        }
        Commands::Config => {
            let path = config::write_default_config().context("Failed to write default config")?;
            println!("{}", path.display());
        }
        Commands::Classify { file } => {
            let recording = Recording::load(&file)?;
            for frame in recording.frames() {
                let gesture = classify(frame.hands.first().map(Vec::as_slice), &config.gesture);
                println!("{:>8.3}  {}", frame.time, gesture);
            }
        }
    }

    Ok(())
}
