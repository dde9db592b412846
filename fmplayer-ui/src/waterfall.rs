use eframe::egui::{ColorImage, Image, Response, TextureHandle, TextureOptions, Ui, Widget};
use eframe::epaint::Color32;
use fmplayer_messages::{Decibels, SpectrumFrame};

/// Rows kept on screen; older lines scroll off the bottom.
pub const WATERFALL_ROWS: usize = 256;

/// Waterfall display widget that renders a scrolling spectrogram.
///
/// Implements `Widget` for `&mut Waterfall`, so it is drawn with
/// `ui.add(&mut waterfall)`. Pixels are computed when a frame arrives and
/// the texture is only re-uploaded when they changed.
pub struct Waterfall {
    image: ColorImage,
    needs_gpu_upload: bool,
    /// Cached texture handle to avoid re-uploading on every frame
    waterfall_texture_handle: Option<TextureHandle>,
}

impl Waterfall {
    pub fn new() -> Self {
        Self {
            image: ColorImage::default(),
            needs_gpu_upload: false,
            waterfall_texture_handle: None,
        }
    }

    pub fn rows(&self) -> usize {
        if self.image.pixels.is_empty() {
            0
        } else {
            self.image.size[1]
        }
    }

    /// Insert a frame as the new top line, colored on the frame's own
    /// display range.
    pub fn insert_frame(&mut self, frame: &SpectrumFrame) {
        let width = frame.bin_count();
        if width == 0 {
            return;
        }
        // A different FFT size starts a fresh picture.
        if !self.image.pixels.is_empty() && self.image.size[0] != width {
            self.image = ColorImage::default();
        }

        let line = frame
            .bins
            .iter()
            .map(|&db| decibels_to_color(Decibels(db), frame.min_db, frame.max_db));
        let mut pixels = Vec::with_capacity(self.image.pixels.len() + width);
        pixels.extend(line);
        pixels.extend(
            self.image
                .pixels
                .iter()
                .take((WATERFALL_ROWS - 1) * width)
                .copied(),
        );
        self.image.size = [width, pixels.len() / width];
        self.image.pixels = pixels;
        self.needs_gpu_upload = true;
    }
}

fn decibels_to_color(decibels: Decibels, min: Decibels, max: Decibels) -> Color32 {
    let range_len = (max.0 - min.0).max(0.01); // avoid div by 0
    let scaled = (decibels.clamp(min, max).0 - min.0) / range_len;
    Color32::from_gray((scaled * 255.0).round() as u8)
}

impl Widget for &mut Waterfall {
    fn ui(self, ui: &mut Ui) -> Response {
        if self.rows() == 0 {
            ui.label("Waiting for spectrum data...");
            return ui.response();
        }

        if self.needs_gpu_upload {
            let texture =
                ui.ctx()
                    .load_texture("waterfall", self.image.clone(), TextureOptions::LINEAR);
            self.waterfall_texture_handle = Some(texture);
            self.needs_gpu_upload = false;
        }

        if let Some(texture_handle) = &self.waterfall_texture_handle {
            let available_size = ui.available_size();
            ui.add(Image::new(texture_handle).fit_to_exact_size(available_size));
        }

        ui.response()
    }
}
