use eframe::egui::{
    Align2, Color32, FontId, Pos2, Rect, Response, Sense, Shape, Stroke, Ui, Vec2, Widget,
};
use fmplayer_messages::{Hertz, SpectrumFrame};

const Y_LABEL: &str = "Relative Gain (dB)";
const DB_GRID_STEP: f32 = 20.0;
const FREQ_GRID_DIVISIONS: usize = 8;
const MARGIN_LEFT: f32 = 56.0;
const MARGIN_BOTTOM: f32 = 22.0;

/// Line plot of the most recent spectrum frame, with a dB / frequency grid.
pub struct SpectrumPlot {
    frame: Option<SpectrumFrame>,
}

impl SpectrumPlot {
    pub fn new() -> Self {
        Self { frame: None }
    }

    pub fn set_frame(&mut self, frame: SpectrumFrame) {
        self.frame = Some(frame);
    }
}

/// Screen position of `bin` at level `db` inside `plot`.
fn bin_to_screen(plot: Rect, frame: &SpectrumFrame, bin: usize, db: f32) -> Pos2 {
    let n = frame.bin_count().max(2) as f32;
    let x = plot.left() + plot.width() * bin as f32 / (n - 1.0);
    let (min, max) = (frame.min_db.0, frame.max_db.0);
    let t = ((db.clamp(min, max) - min) / (max - min).max(0.01)).clamp(0.0, 1.0);
    Pos2::new(x, plot.bottom() - plot.height() * t)
}

fn draw_grid(ui: &Ui, plot: Rect, frame: &SpectrumFrame) {
    let painter = ui.painter();
    let grid = Stroke::new(0.5, Color32::from_gray(60));
    let text = ui.visuals().text_color();
    let font = FontId::monospace(10.0);

    let mut db = (frame.min_db.0 / DB_GRID_STEP).ceil() * DB_GRID_STEP;
    while db <= frame.max_db.0 {
        let y = bin_to_screen(plot, frame, 0, db).y;
        painter.hline(plot.x_range(), y, grid);
        painter.text(
            Pos2::new(plot.left() - 4.0, y),
            Align2::RIGHT_CENTER,
            format!("{db:.0}"),
            font.clone(),
            text,
        );
        db += DB_GRID_STEP;
    }

    let low = frame.center_frequency.0 - frame.bandwidth.0 / 2.0;
    for i in 0..=FREQ_GRID_DIVISIONS {
        let t = i as f32 / FREQ_GRID_DIVISIONS as f32;
        let x = plot.left() + plot.width() * t;
        painter.vline(x, plot.y_range(), grid);
        let freq = Hertz(low + frame.bandwidth.0 * t as f64);
        let align = match i {
            0 => Align2::LEFT_TOP,
            i if i == FREQ_GRID_DIVISIONS => Align2::RIGHT_TOP,
            _ => Align2::CENTER_TOP,
        };
        painter.text(
            Pos2::new(x, plot.bottom() + 4.0),
            align,
            freq.to_string(),
            font.clone(),
            text,
        );
    }

    painter.text(
        Pos2::new(plot.left() + 6.0, plot.top() + 4.0),
        Align2::LEFT_TOP,
        Y_LABEL,
        font,
        text,
    );
}

impl Widget for &mut SpectrumPlot {
    fn ui(self, ui: &mut Ui) -> Response {
        let Some(frame) = &self.frame else {
            return ui.label("Waiting for spectrum data...");
        };

        let size = Vec2::new(ui.available_width(), ui.available_height());
        let (response, painter) = ui.allocate_painter(size, Sense::hover());
        let outer = response.rect;
        let plot = Rect::from_min_max(
            Pos2::new(outer.left() + MARGIN_LEFT, outer.top() + 4.0),
            Pos2::new(outer.right() - 8.0, outer.bottom() - MARGIN_BOTTOM),
        );
        painter.rect_stroke(
            plot,
            0.0,
            Stroke::new(1.0, Color32::from_gray(90)),
            eframe::egui::StrokeKind::Inside,
        );
        draw_grid(ui, plot, frame);

        let points: Vec<Pos2> = frame
            .bins
            .iter()
            .enumerate()
            .map(|(bin, &db)| bin_to_screen(plot, frame, bin, db))
            .collect();
        painter.add(Shape::line(points, Stroke::new(1.0, Color32::LIGHT_GREEN)));

        painter.text(
            Pos2::new(plot.right() - 6.0, plot.top() + 4.0),
            Align2::RIGHT_TOP,
            &frame.label,
            FontId::proportional(13.0),
            Color32::LIGHT_GREEN,
        );

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmplayer_messages::Decibels;

    fn frame() -> SpectrumFrame {
        SpectrumFrame {
            bins: vec![-140.0; 5],
            center_frequency: Hertz(100e6),
            bandwidth: Hertz(250_000.0),
            label: "capture.iq".into(),
            min_db: Decibels(-140.0),
            max_db: Decibels(10.0),
            seq: 3,
        }
    }

    #[test]
    fn test_range_maps_to_plot_edges() {
        let plot = Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(400.0, 150.0));
        let f = frame();
        assert_eq!(bin_to_screen(plot, &f, 0, -140.0), Pos2::new(0.0, 150.0));
        assert_eq!(bin_to_screen(plot, &f, 4, 10.0), Pos2::new(400.0, 0.0));
        assert_eq!(bin_to_screen(plot, &f, 2, -65.0), Pos2::new(200.0, 75.0));
    }

    #[test]
    fn test_out_of_range_levels_stay_inside() {
        let plot = Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(100.0, 100.0));
        let f = frame();
        assert_eq!(bin_to_screen(plot, &f, 0, 50.0).y, 0.0);
        assert_eq!(bin_to_screen(plot, &f, 0, f32::NEG_INFINITY).y, 100.0);
    }
}
