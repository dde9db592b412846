use flume::Sender;

use crate::info_panel::{InfoPanel, Status};
use crate::spectrum_plot::SpectrumPlot;
use crate::waterfall::Waterfall;
use fmplayer_messages::{Command, Event, PipelineState, SpectrumFrame};

/// Local UI state derived from engine events and spectrum frames.
pub(super) struct UiState {
    /// Current pipeline state (from StateSnapshot)
    pub pipeline: Option<PipelineState>,
    pub plot: SpectrumPlot,
    pub waterfall: Waterfall,
    pub info_panel: InfoPanel,
    last_seq: Option<u64>,
}

impl UiState {
    pub fn new(cmd_tx: Sender<Command>) -> Self {
        Self {
            pipeline: None,
            plot: SpectrumPlot::new(),
            waterfall: Waterfall::new(),
            info_panel: InfoPanel::new(cmd_tx),
            last_seq: None,
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::StateSnapshot(state) => {
                self.info_panel.update_from_pipeline_state(state.clone());
                self.pipeline = Some(state);
            }
            Event::Finished { error } => {
                if let Some(e) = &error {
                    log::error!("Playback failed: {e}");
                }
                self.info_panel.status = Status::Finished { error };
            }
        }
    }

    /// Show a frame unless it is one already shown.
    pub fn handle_frame(&mut self, frame: SpectrumFrame) {
        if self.last_seq == Some(frame.seq) {
            return;
        }
        self.last_seq = Some(frame.seq);
        self.waterfall.insert_frame(&frame);
        self.plot.set_frame(frame);
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.info_panel.status, Status::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmplayer_messages::{Decibels, Hertz};

    fn frame(seq: u64) -> SpectrumFrame {
        SpectrumFrame {
            bins: vec![-100.0; 16],
            center_frequency: Hertz(0.0),
            bandwidth: Hertz(48_000.0),
            label: "x".into(),
            min_db: Decibels(-140.0),
            max_db: Decibels(10.0),
            seq,
        }
    }

    #[test]
    fn test_repeated_frame_is_ignored() {
        let (tx, _rx) = flume::unbounded();
        let mut state = UiState::new(tx);
        state.handle_frame(frame(0));
        state.handle_frame(frame(0));
        state.handle_frame(frame(1));
        assert_eq!(state.waterfall.rows(), 2);
    }

    #[test]
    fn test_finished_event_ends_display() {
        let (tx, _rx) = flume::unbounded();
        let mut state = UiState::new(tx);
        assert!(!state.is_finished());
        state.handle_event(Event::Finished { error: None });
        assert!(state.is_finished());
    }
}
