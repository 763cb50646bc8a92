/// Lowest threshold reachable by key presses, in hundredths.
const MIN_HUNDREDTHS: u8 = 5;
/// Highest threshold reachable by key presses, in hundredths.
const MAX_HUNDREDTHS: u8 = 95;
/// Size of one key-driven adjustment, in hundredths.
const STEP_HUNDREDTHS: u8 = 5;

pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// User-adjustable confidence cutoff for rendering detections.
///
/// Stored as integer hundredths so that any number of `raise`/`lower` steps
/// lands exactly on a multiple of 0.05 with no accumulated drift.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfidenceThreshold {
    hundredths: u8,
}

impl ConfidenceThreshold {
    /// Build a threshold from an arbitrary value, rounding to the nearest
    /// hundredth and saturating into `[0.05, 0.95]`. NaN maps to the default.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        let scaled = (value * 100.0).round();
        let hundredths = scaled.clamp(MIN_HUNDREDTHS as f32, MAX_HUNDREDTHS as f32) as u8;
        Self { hundredths }
    }

    pub fn value(self) -> f32 {
        self.hundredths as f32 / 100.0
    }

    /// Raise by one step, saturating at 0.95. Returns the new value.
    pub fn raise(&mut self) -> f32 {
        self.hundredths = self
            .hundredths
            .saturating_add(STEP_HUNDREDTHS)
            .min(MAX_HUNDREDTHS);
        self.value()
    }

    /// Lower by one step, saturating at 0.05. Returns the new value.
    pub fn lower(&mut self) -> f32 {
        self.hundredths = self
            .hundredths
            .saturating_sub(STEP_HUNDREDTHS)
            .max(MIN_HUNDREDTHS);
        self.value()
    }

    pub fn admits(self, confidence: f32) -> bool {
        confidence >= self.value()
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl std::fmt::Display for ConfidenceThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}
