//! Min/max tracking for the analog input sampled during a transmission.
//!
//! The sampler delivers readings from interrupt context (or a concurrently
//! scheduled task) while the measurement window is open. Each bound lives in
//! its own atomic and is only ever clamped toward its extreme, so a torn read
//! of the pair is harmless. The controller reads the pair only after the
//! completion event, and resets it only when no window is open.

use portable_atomic::{AtomicU32, Ordering};

/// Observed bounds of the raw analog reading over one window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AnalogExtremes {
    pub min: u32,
    pub max: u32,
}

impl AnalogExtremes {
    /// Sentinel left behind by a reset with no samples since.
    pub const UNSAMPLED: Self = Self {
        min: u32::MAX,
        max: 0,
    };

    /// Returns `false` for the reset sentinel; its fields are not real readings.
    pub const fn is_sampled(&self) -> bool {
        self.min <= self.max
    }

    /// Folds one reading into a plain (non-atomic) pair.
    #[must_use]
    pub fn including(self, value: u32) -> Self {
        Self {
            min: self.min.min(value),
            max: self.max.max(value),
        }
    }
}

impl Default for AnalogExtremes {
    fn default() -> Self {
        Self::UNSAMPLED
    }
}

/// Interrupt-safe min/max aggregator.
#[derive(Debug)]
pub struct AtomicExtremes {
    min: AtomicU32,
    max: AtomicU32,
}

impl AtomicExtremes {
    pub const fn new() -> Self {
        Self {
            min: AtomicU32::new(u32::MAX),
            max: AtomicU32::new(0),
        }
    }

    pub fn reset(&self) {
        self.min.store(u32::MAX, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
    }

    /// Called from the sample-ready handler.
    pub fn observe(&self, value: u32) {
        self.min.fetch_min(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);
    }

    pub fn read(&self) -> AnalogExtremes {
        AnalogExtremes {
            min: self.min.load(Ordering::Relaxed),
            max: self.max.load(Ordering::Relaxed),
        }
    }
}

impl Default for AtomicExtremes {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear raw-code to millivolt conversion, applied only when formatting.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AnalogScale {
    pub full_scale_mv: u32,
    pub max_code: u32,
}

impl AnalogScale {
    /// 10-bit sampler with a 3.6 V full scale.
    pub const TEN_BIT_3V6: Self = Self::new(3_600, 1_023);
    /// 12-bit sampler referenced to a 3.3 V rail.
    pub const TWELVE_BIT_3V3: Self = Self::new(3_300, 4_095);
    /// Sampler that already reports millivolts.
    pub const MILLIVOLTS: Self = Self::new(1, 1);

    pub const fn new(full_scale_mv: u32, max_code: u32) -> Self {
        Self {
            full_scale_mv,
            max_code,
        }
    }

    /// `raw * full_scale_mv / max_code`, truncating.
    pub fn to_millivolts(&self, raw: u32) -> u32 {
        if self.max_code == 0 {
            return 0;
        }
        let scaled = u64::from(raw) * u64::from(self.full_scale_mv) / u64::from(self.max_code);
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }
}

impl Default for AnalogScale {
    fn default() -> Self {
        Self::TEN_BIT_3V6
    }
}

/// Capability handed to the measurement controller.
///
/// [`NoAnalog`] turns the voltage columns off; `&AtomicExtremes` turns them on.
pub trait AnalogProbe {
    /// Whether reports carry the voltage columns.
    fn is_enabled(&self) -> bool;

    /// One-time start-up hook for the sampler hardware.
    fn arm(&mut self) {}

    /// Called immediately before a window opens.
    fn begin_window(&mut self);

    /// Called after the completion event; `None` when the probe is disabled.
    fn end_window(&mut self) -> Option<AnalogExtremes>;
}

/// Probe used when voltage measurement is turned off.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoAnalog;

impl AnalogProbe for NoAnalog {
    fn is_enabled(&self) -> bool {
        false
    }

    fn begin_window(&mut self) {}

    fn end_window(&mut self) -> Option<AnalogExtremes> {
        None
    }
}

impl AnalogProbe for &AtomicExtremes {
    fn is_enabled(&self) -> bool {
        true
    }

    fn begin_window(&mut self) {
        self.reset();
    }

    fn end_window(&mut self) -> Option<AnalogExtremes> {
        Some(self.read())
    }
}
