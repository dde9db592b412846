use fmplayer_engine::audio::{AudioSink, NullSink, PcmWriterSink};
use fmplayer_engine::config::AUDIO_SAMPLE_RATE;
use fmplayer_engine::{Engine, EngineOptions, PipelineConfig};
use fmplayer_messages::{Command, DemodMode, Event, frame_mailbox};

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use log::{LevelFilter, info};
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum AudioOut {
    /// Default output device
    Device,
    /// Raw s16le mono PCM at 48 kHz on stdout
    Stdout,
    /// Discard audio
    None,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Play back an FM channel from a recorded I/Q file", long_about = None)]
struct Cli {
    /// Recording of interleaved signed 16-bit little-endian I/Q pairs
    #[arg(short, long)]
    input: PathBuf,

    /// Sample rate of the recording, Hz
    #[arg(short, long)]
    sample_rate: f64,

    /// Channel offset from the recording's center, Hz
    #[arg(short, long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset: f64,

    /// Narrowband FM (default). The last of -N / -D wins
    #[arg(short = 'N', long, overrides_with = "wbfm")]
    nbfm: bool,

    /// Wideband FM
    #[arg(short = 'D', long, overrides_with = "nbfm")]
    wbfm: bool,

    /// Output gain
    #[arg(short, long, default_value_t = 0.3)]
    volume: f32,

    /// Center frequency shown on the spectrum, Hz
    #[arg(short = 'f', long, default_value_t = 0.0, allow_hyphen_values = true)]
    center_freq: f64,

    /// Keep the player up after the recording ends, until Enter is pressed
    #[arg(short = 'W', long, action = ArgAction::SetTrue)]
    wait: bool,

    #[arg(long, default_value_t = 10)]
    rf_decimation: usize,

    #[arg(long, default_value_t = 4)]
    audio_decimation: usize,

    /// Peak FM deviation, Hz
    #[arg(long, default_value_t = 5e3)]
    deviation: f64,

    #[arg(long, default_value_t = 1024)]
    fft_size: usize,

    /// Process as fast as possible instead of in real time
    #[arg(long)]
    no_throttle: bool,

    /// Run without the spectrum window
    #[arg(long)]
    headless: bool,

    /// Where the audio goes; the output device when built with it
    #[arg(long, value_enum)]
    audio: Option<AudioOut>,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new(&self.input, self.sample_rate);
        config.frequency_offset = self.offset;
        config.demod = match (self.nbfm, self.wbfm) {
            (false, true) => DemodMode::Wideband,
            _ => DemodMode::Narrowband,
        };
        config.volume = self.volume;
        config.center_frequency = self.center_freq;
        config.rf_decimation = self.rf_decimation;
        config.audio_decimation = self.audio_decimation;
        config.deviation = self.deviation;
        config.fft_size = self.fft_size;
        config.throttle = !self.no_throttle;
        config
    }
}

fn init_logger() {
    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "{:<5} - {} - {}",
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .filter_module("fmplayer_engine", LevelFilter::Info)
        .filter_module("fmplayer_ui", LevelFilter::Info)
        .filter_module("rustradio", LevelFilter::Warn)
        .filter_module("eframe", LevelFilter::Warn)
        .filter_module("egui_glow", LevelFilter::Warn)
        .filter_module("winit", LevelFilter::Warn)
        .parse_default_env()
        .init();
}

fn open_audio(choice: Option<AudioOut>) -> anyhow::Result<Box<dyn AudioSink>> {
    let default = if cfg!(feature = "audio") {
        AudioOut::Device
    } else {
        AudioOut::None
    };
    match choice.unwrap_or(default) {
        AudioOut::Device => open_device(),
        AudioOut::Stdout => Ok(Box::new(PcmWriterSink::stdout())),
        AudioOut::None => {
            if choice.is_none() {
                info!(
                    "Built without an audio device; use --audio stdout | aplay -f S16_LE -r {} -c 1",
                    AUDIO_SAMPLE_RATE
                );
            }
            Ok(Box::new(NullSink::default()))
        }
    }
}

#[cfg(feature = "audio")]
fn open_device() -> anyhow::Result<Box<dyn AudioSink>> {
    let sink = fmplayer_engine::audio::DeviceSink::open(None, AUDIO_SAMPLE_RATE)
        .context("opening audio output device")?;
    Ok(Box::new(sink))
}

#[cfg(not(feature = "audio"))]
fn open_device() -> anyhow::Result<Box<dyn AudioSink>> {
    anyhow::bail!("built without audio device support; rebuild with `--features audio` or use `--audio stdout`")
}

/// Stop the engine when Enter is pressed (or stdin closes).
fn spawn_wait_for_enter(cmd_tx: flume::Sender<Command>) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("wait-for-enter".into())
        .spawn(move || {
            eprintln!("Press Enter to quit");
            let mut line = String::new();
            let _ = std::io::stdin().lock().read_line(&mut line);
            let _ = cmd_tx.send(Command::Stop);
        })
        .context("spawning stdin thread")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger();

    let config = cli.pipeline_config();
    config.validate().context("invalid configuration")?;
    let audio_sink = open_audio(cli.audio)?;

    // Create flume channels for bidirectional communication
    let (cmd_tx, cmd_rx) = flume::unbounded();
    let (event_tx, event_rx) = flume::unbounded::<Event>();
    let (publisher, frames) = frame_mailbox();

    let options = EngineOptions {
        hold_after_eof: cli.wait,
        ..EngineOptions::default()
    };
    if cli.wait {
        spawn_wait_for_enter(cmd_tx.clone())?;
    }

    // Spawn engine thread
    let engine_handle = std::thread::Builder::new()
        .name("engine".into())
        .spawn(move || {
            let engine = Engine::new(cmd_rx, event_tx, publisher, config, audio_sink)
                .with_options(options);
            engine.run()
        })?;

    if cli.headless {
        // Nothing reads frames or events; the engine ends on its own.
        drop(frames);
        drop(event_rx);
    } else {
        // Run UI on main thread (blocking)
        fmplayer_ui::run(event_rx, frames, cmd_tx.clone())?;
    }

    let result = engine_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Engine thread panicked"))?;
    drop(cmd_tx);
    result
}
