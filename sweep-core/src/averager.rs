//! Fixed-point averaging of elapsed-time samples.
//!
//! Means are reported ×10 so one decimal digit survives without floating
//! point. Division truncates toward zero.

use core::fmt;

/// Mean elapsed time scaled by ten (`165` means 16.5 ms).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MeanTenths(u64);

impl MeanTenths {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw ×10 value as printed in the report.
    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn whole_ms(self) -> u64 {
        self.0 / 10
    }

    pub const fn tenths_digit(self) -> u8 {
        (self.0 % 10) as u8
    }
}

impl fmt::Display for MeanTenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}ms", self.whole_ms(), self.tenths_digit())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AveragerError {
    ZeroTarget,
}

impl fmt::Display for AveragerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AveragerError::ZeroTarget => f.write_str("sample target must be at least one"),
        }
    }
}

/// Accumulates samples for one parameter combination.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SampleAccumulator {
    total: u64,
    count: u32,
    target: u32,
}

impl SampleAccumulator {
    /// Fails with [`AveragerError::ZeroTarget`] when `target` is zero.
    pub fn new(target: u32) -> Result<Self, AveragerError> {
        if target == 0 {
            return Err(AveragerError::ZeroTarget);
        }
        Ok(Self {
            total: 0,
            count: 0,
            target,
        })
    }

    /// Samples needed before a mean is produced.
    pub fn target(&self) -> u32 {
        self.target
    }

    /// Samples recorded toward the current mean.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Sum of the recorded samples in milliseconds.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Discards partial progress without emitting a mean.
    pub fn reset(&mut self) {
        self.total = 0;
        self.count = 0;
    }

    /// Adds one sample; returns the ×10 mean once `target` samples are in.
    pub fn record_sample(&mut self, elapsed_ms: u32) -> Option<MeanTenths> {
        self.total = self.total.saturating_add(u64::from(elapsed_ms));
        self.count += 1;

        if self.count < self.target {
            return None;
        }

        let mean = mean_tenths(self.total, self.count);
        self.reset();
        Some(mean)
    }
}

/// `total * 10 / count`, truncating.
pub fn mean_tenths(total: u64, count: u32) -> MeanTenths {
    if count == 0 {
        return MeanTenths::default();
    }
    MeanTenths(total.saturating_mul(10) / u64::from(count))
}
