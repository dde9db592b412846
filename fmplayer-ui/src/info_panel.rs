use eframe::egui::{Grid, Response, Ui, Widget};
use flume::Sender;

use fmplayer_messages::{Command, PipelineState};

/// What the player is doing, as far as the display knows.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Starting,
    Playing,
    Stopping,
    Finished { error: Option<String> },
}

/// Read-only pipeline parameters plus a Stop button.
pub struct InfoPanel {
    cmd_tx: Sender<Command>,
    pipeline: Option<PipelineState>,
    pub status: Status,
}

impl InfoPanel {
    pub fn new(cmd_tx: Sender<Command>) -> Self {
        Self {
            cmd_tx,
            pipeline: None,
            status: Status::Starting,
        }
    }

    pub fn update_from_pipeline_state(&mut self, state: PipelineState) {
        self.pipeline = Some(state);
        if self.status == Status::Starting {
            self.status = Status::Playing;
        }
    }

    pub fn request_stop(&mut self) {
        if matches!(self.status, Status::Finished { .. } | Status::Stopping) {
            return;
        }
        self.status = Status::Stopping;
        if self.cmd_tx.send(Command::Stop).is_err() {
            log::debug!("Engine already gone, nothing to stop");
        }
    }
}

impl Widget for &mut InfoPanel {
    fn ui(self, ui: &mut Ui) -> Response {
        ui.heading("Playback");
        ui.separator();

        if let Some(state) = &self.pipeline {
            ui.label(&state.label);
            ui.add_space(6.0);
            Grid::new("pipeline_info")
                .num_columns(2)
                .spacing([12.0, 4.0])
                .show(ui, |ui| {
                    let rows = [
                        ("Input rate", format!("{}", state.input_rate)),
                        ("Quadrature rate", format!("{}", state.quadrature_rate)),
                        ("Demod audio rate", format!("{}", state.demod_audio_rate)),
                        ("Audio rate", format!("{}", state.output_rate)),
                        ("Center", format!("{}", state.center_frequency)),
                        ("Offset", format!("{}", state.frequency_offset)),
                        ("Mode", state.demod.to_string()),
                        ("Volume", format!("{:.2}", state.volume)),
                        ("FFT size", state.fft_size.to_string()),
                    ];
                    for (name, value) in rows {
                        ui.label(name);
                        ui.monospace(value);
                        ui.end_row();
                    }
                });
        }

        ui.add_space(10.0);
        ui.separator();
        match &self.status {
            Status::Starting => ui.label("Starting..."),
            Status::Playing => ui.label("Playing"),
            Status::Stopping => ui.label("Stopping..."),
            Status::Finished { error: None } => ui.label("Finished"),
            Status::Finished { error: Some(e) } => ui.colored_label(ui.visuals().error_fg_color, e),
        };

        let can_stop = matches!(self.status, Status::Starting | Status::Playing);
        ui.add_enabled_ui(can_stop, |ui| {
            if ui.button("Stop").clicked() {
                self.request_stop();
            }
        });

        ui.response()
    }
}
