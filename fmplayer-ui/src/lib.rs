mod info_panel;
mod spectrum_plot;
mod state;
mod waterfall;

use eframe::egui::{self, ViewportCommand};
use fmplayer_messages::{Command, Event, FrameReceiver};
use state::UiState;
use std::time::Duration;

/// Main application struct implementing the egui App trait.
pub struct FmPlayerApp {
    /// Receiver for events from engine
    event_rx: flume::Receiver<Event>,
    /// Latest spectrum frame from the engine
    frames: FrameReceiver,

    /// Local application state
    state: UiState,
}

impl FmPlayerApp {
    fn new(
        event_rx: flume::Receiver<Event>,
        frames: FrameReceiver,
        cmd_tx: flume::Sender<Command>,
    ) -> Self {
        Self {
            event_rx,
            frames,
            state: UiState::new(cmd_tx),
        }
    }
}

impl eframe::App for FmPlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        for event in self.event_rx.try_iter() {
            self.state.handle_event(event);
        }
        if let Some(frame) = self.frames.try_latest() {
            self.state.handle_frame(frame);
        }

        if self.state.is_finished() {
            ctx.send_viewport_cmd(ViewportCommand::Close);
        } else if ctx.input(|i| i.viewport().close_requested()) {
            self.state.info_panel.request_stop();
        }

        // Frames arrive about ten times a second.
        ctx.request_repaint_after(Duration::from_millis(30));

        egui::SidePanel::right("info_panel")
            .default_width(250.0)
            .show(ctx, |ui| {
                ui.add(&mut self.state.info_panel);
            });

        egui::TopBottomPanel::bottom("waterfall")
            .resizable(true)
            .default_height(260.0)
            .show(ctx, |ui| {
                ui.add(&mut self.state.waterfall);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.state.pipeline.is_some() {
                ui.add(&mut self.state.plot);
            } else {
                ui.centered_and_justified(|ui| {
                    ui.label("Waiting for engine...");
                });
            }
        });
    }
}

/// Entry point for the UI module.
///
/// Runs the eframe application on the main thread (blocking). Closing the
/// window stops the engine.
pub fn run(
    event_rx: flume::Receiver<Event>,
    frames: FrameReceiver,
    cmd_tx: flume::Sender<Command>,
) -> anyhow::Result<()> {
    let title = "FM Player";
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_title(title),
        ..Default::default()
    };

    let stop_tx = cmd_tx.clone();
    let result = eframe::run_native(
        title,
        options,
        Box::new(|_cc| Ok(Box::new(FmPlayerApp::new(event_rx, frames, cmd_tx)))),
    );
    // The window may go away without its close request being seen.
    let _ = stop_tx.send(Command::Stop);
    result.map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
