//! DSP backend of the FM recording player.

pub mod audio;
mod blocks;
pub mod config;
pub mod dsp;
mod graph;
mod sinks;
pub mod source;
pub mod throttle;

use anyhow::{Result, anyhow};
use flume::{Receiver, RecvTimeoutError, Sender};
use fmplayer_messages::{Command, Event, FramePublisher};
use log::{debug, info, warn};
use rustradio::graph::{CancellationToken, GraphRunner};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub use audio::AudioSink;
pub use config::{ConfigError, PipelineConfig};

type GraphHandle = JoinHandle<std::result::Result<(), rustradio::Error>>;

/// How the engine behaves around the end of the run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Keep running after end of stream until `Command::Stop` arrives.
    pub hold_after_eof: bool,
    /// How long to wait for the graph after cancelling it.
    pub shutdown_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            hold_after_eof: false,
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// The player backend.
/// Owns the rustradio graph and processes commands from the UI.
pub struct Engine {
    cmd_rx: Receiver<Command>,
    event_tx: Sender<Event>,
    frames: FramePublisher,
    config: PipelineConfig,
    audio_sink: Box<dyn AudioSink>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(
        cmd_rx: Receiver<Command>,
        event_tx: Sender<Event>,
        frames: FramePublisher,
        config: PipelineConfig,
        audio_sink: Box<dyn AudioSink>,
    ) -> Self {
        debug!("Constructing a new engine");
        Self {
            cmd_rx,
            event_tx,
            frames,
            config,
            audio_sink,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the engine (blocking) until end of stream, `Command::Stop`, or
    /// an error. `Event::Finished` is sent in every case.
    pub fn run(self) -> Result<()> {
        let event_tx = self.event_tx.clone();
        let result = self.run_pipeline();
        let error = result.as_ref().err().map(|e| format!("{e:#}"));
        if event_tx.send(Event::Finished { error }).is_err() {
            debug!("No one is listening for the finish event");
        }
        result
    }

    fn run_pipeline(self) -> Result<()> {
        let Engine {
            cmd_rx,
            event_tx,
            frames,
            config,
            audio_sink,
            options,
        } = self;

        config.validate()?;
        let graph::PlayerGraph {
            mut graph,
            read_errors,
        } = graph::build_graph(&config, audio_sink, frames)?;
        let cancel_token = graph.cancel_token();

        if event_tx.send(Event::StateSnapshot(config.state())).is_err() {
            debug!("No one is listening for the state snapshot");
        }

        let graph_handle = thread::Builder::new()
            .name("dsp-graph".into())
            .spawn(move || graph.run())?;

        match process_commands(
            &cmd_rx,
            &cancel_token,
            graph_handle,
            &read_errors,
            options.hold_after_eof,
        ) {
            Outcome::Finished(result) => result,
            Outcome::Cancelled(handle) => join_within(handle, options.shutdown_timeout),
        }
    }
}

enum Outcome {
    /// The graph ran to completion (or failed) on its own.
    Finished(Result<()>),
    /// The graph was cancelled and may still be winding down.
    Cancelled(GraphHandle),
}

fn process_commands(
    cmd_rx: &Receiver<Command>,
    cancel_token: &CancellationToken,
    graph_handle: GraphHandle,
    read_errors: &Receiver<rustradio::Error>,
    hold_after_eof: bool,
) -> Outcome {
    let mut running = Some(graph_handle);
    let mut finished = Ok(());
    loop {
        let msg = cmd_rx.recv_timeout(Duration::from_millis(100));
        match msg {
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => {
                debug!("Engine received {msg:?}");
                match running.take() {
                    Some(handle) => {
                        info!("Stopping playback");
                        cancel_token.cancel();
                        return Outcome::Cancelled(handle);
                    }
                    None => return Outcome::Finished(finished),
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let Some(handle) = running.take_if(|h| h.is_finished()) else {
                    continue;
                };
                finished = join_finished(handle).and_then(|()| match read_errors.try_recv() {
                    Ok(e) => Err(anyhow::Error::from(e).context("reading recording")),
                    Err(_) => Ok(()),
                });
                if finished.is_err() || !hold_after_eof {
                    return Outcome::Finished(finished);
                }
                info!("Playback finished, waiting for stop");
            }
        }
    }
}

fn join_finished(handle: GraphHandle) -> Result<()> {
    let graph_result = handle
        .join()
        .map_err(|_| anyhow!("Graph thread panicked"))?;
    graph_result.map_err(|e| anyhow!("Graph error: {}", e))
}

fn join_within(handle: GraphHandle, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("Graph did not stop within {timeout:?}, detaching it");
            return Ok(());
        }
        thread::sleep(Duration::from_millis(10));
    }
    join_finished(handle)
}
