/// Frequency in Hertz.
///
/// Fractional and negative values are allowed: channel offsets are signed,
/// and derived rates (input rate over a decimation factor) need not be integral.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Hertz(pub f64);

impl std::fmt::Display for Hertz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hz = self.0;
        if hz.abs() >= 1e6 {
            write!(f, "{:.6} MHz", hz / 1e6)
        } else if hz.abs() >= 1e3 {
            write!(f, "{:.3} kHz", hz / 1e3)
        } else {
            write!(f, "{hz} Hz")
        }
    }
}

impl Hertz {
    pub const fn as_hz(self) -> f64 {
        self.0
    }
}

/// Level in Decibels (dB).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Decibels(pub f32);

impl std::fmt::Display for Decibels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1} dB", self.0)
    }
}

impl Decibels {
    /// Power ratio to decibels, `10 * log10(power)`. Zero power gives -inf.
    pub fn from_power(power: f32) -> Self {
        Self(10.0 * power.log10())
    }

    /// Clamp into `[min, max]`. NaN maps to `min`.
    pub fn clamp(self, min: Decibels, max: Decibels) -> Self {
        if self.0.is_nan() {
            return min;
        }
        Self(self.0.clamp(min.0, max.0))
    }
}
