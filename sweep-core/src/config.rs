//! Compile-time configuration for a measurement run.

use crate::analog::AnalogScale;
use crate::measurement::{RejectionPolicy, TimeoutPolicy};
use crate::sweep::{SweepAxis, SweepPlan};

/// Payload length axis, in bytes.
pub const PAYLOAD_MIN: u8 = 0;
pub const PAYLOAD_MAX: u8 = 100;
pub const PAYLOAD_STEP: u8 = 20;

/// Retry count axis. The radio sends `retry_count + 1` copies of a broadcast.
pub const RETRY_MIN: u8 = 0;
pub const RETRY_MAX: u8 = 8;
pub const RETRY_STEP: u8 = 2;

/// Retry interval axis, in milliseconds.
pub const RETRY_INTERVAL_MIN_MS: u16 = 1;
pub const RETRY_INTERVAL_MAX_MS: u16 = 10;
pub const RETRY_INTERVAL_STEP_MS: u16 = 2;

/// Samples averaged per combination; individual timings jitter.
pub const SAMPLES_PER_COMBINATION: u32 = 5;

/// Period of the tick that paces transmissions.
pub const TICK_PERIOD_MS: u32 = 1_000;

/// Network identity shared with any listening peer.
pub const APP_ID: u32 = 0x6772_0103;
pub const RADIO_CHANNEL: u8 = 18;

/// Debug console baud rate.
pub const DEBUG_UART_BAUD: u32 = 115_200;

/// Sweep over the compile-time axes above.
pub const DEFAULT_PLAN: SweepPlan = SweepPlan::new_unchecked(
    SweepAxis::new_unchecked(PAYLOAD_MIN, PAYLOAD_MAX, PAYLOAD_STEP),
    SweepAxis::new_unchecked(RETRY_MIN, RETRY_MAX, RETRY_STEP),
    SweepAxis::new_unchecked(
        RETRY_INTERVAL_MIN_MS,
        RETRY_INTERVAL_MAX_MS,
        RETRY_INTERVAL_STEP_MS,
    ),
);

/// Everything the measurement controller needs besides its collaborators.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MeasurementConfig {
    pub plan: SweepPlan,
    pub samples_per_combination: u32,
    pub analog_scale: AnalogScale,
    pub rejection: RejectionPolicy,
    /// `None` waits for a completion forever.
    pub completion_timeout_ms: Option<u32>,
    pub timeout: TimeoutPolicy,
}

impl MeasurementConfig {
    pub const DEFAULT: Self = Self {
        plan: DEFAULT_PLAN,
        samples_per_combination: SAMPLES_PER_COMBINATION,
        analog_scale: AnalogScale::TEN_BIT_3V6,
        rejection: RejectionPolicy::RetryNextTick,
        completion_timeout_ms: None,
        timeout: TimeoutPolicy::Reissue,
    };

    #[must_use]
    pub const fn with_plan(mut self, plan: SweepPlan) -> Self {
        self.plan = plan;
        self
    }

    #[must_use]
    pub const fn with_samples(mut self, samples: u32) -> Self {
        self.samples_per_combination = samples;
        self
    }

    #[must_use]
    pub const fn with_analog_scale(mut self, scale: AnalogScale) -> Self {
        self.analog_scale = scale;
        self
    }

    #[must_use]
    pub const fn with_rejection(mut self, policy: RejectionPolicy) -> Self {
        self.rejection = policy;
        self
    }

    #[must_use]
    pub const fn with_completion_timeout(mut self, timeout_ms: u32, policy: TimeoutPolicy) -> Self {
        self.completion_timeout_ms = Some(timeout_ms);
        self.timeout = policy;
        self
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::SweepParameters;

    #[test]
    fn default_plan_matches_compile_time_axes() {
        assert_eq!(DEFAULT_PLAN.first(), SweepParameters::new(0, 0, 1));
        // 6 payload lengths x 5 retry counts x 5 intervals (1, 3, 5, 7, 9).
        assert_eq!(DEFAULT_PLAN.combination_count(), 150);
        assert_eq!(
            DEFAULT_PLAN.iter().last(),
            Some(SweepParameters::new(100, 8, 9))
        );
    }

    #[test]
    fn default_plan_passes_runtime_validation() {
        let rebuilt = SweepPlan::new(
            SweepAxis::new(PAYLOAD_MIN, PAYLOAD_MAX, PAYLOAD_STEP).unwrap(),
            SweepAxis::new(RETRY_MIN, RETRY_MAX, RETRY_STEP).unwrap(),
            SweepAxis::new(
                RETRY_INTERVAL_MIN_MS,
                RETRY_INTERVAL_MAX_MS,
                RETRY_INTERVAL_STEP_MS,
            )
            .unwrap(),
        );
        assert_eq!(rebuilt, Ok(DEFAULT_PLAN));
    }

    #[test]
    fn builder_overrides_timeout() {
        let config = MeasurementConfig::DEFAULT.with_completion_timeout(500, TimeoutPolicy::RecordSample);
        assert_eq!(config.completion_timeout_ms, Some(500));
        assert_eq!(config.timeout, TimeoutPolicy::RecordSample);
        assert_eq!(MeasurementConfig::default().completion_timeout_ms, None);
    }
}
