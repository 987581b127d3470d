//! Parameter sweep sequencing shared by firmware and host targets.
//!
//! A sweep walks three independent axes like an odometer: payload length is
//! the fastest-moving digit, then retry count, then retry interval. Every
//! combination is visited exactly once and the sweep is finite.

use core::fmt;

pub mod axis;

pub use axis::{AxisValue, SweepAxis, SweepAxisError};

/// Largest broadcast payload the controller will build, in bytes.
pub const MAX_PAYLOAD_LEN: u8 = 100;

/// One point in the parameter space.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SweepParameters {
    pub payload_len: u8,
    pub retry_count: u8,
    pub retry_interval_ms: u16,
}

impl SweepParameters {
    pub const fn new(payload_len: u8, retry_count: u8, retry_interval_ms: u16) -> Self {
        Self {
            payload_len,
            retry_count,
            retry_interval_ms,
        }
    }
}

impl fmt::Display for SweepParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "len={} retries={} interval={}ms",
            self.payload_len, self.retry_count, self.retry_interval_ms
        )
    }
}

/// Result of advancing the odometer by one position.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Advance {
    Next(SweepParameters),
    Finished,
}

/// Errors raised while assembling a [`SweepPlan`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SweepPlanError {
    PayloadTooLarge { max: u8 },
}

impl fmt::Display for SweepPlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepPlanError::PayloadTooLarge { max } => write!(
                f,
                "payload axis maximum {max} exceeds {MAX_PAYLOAD_LEN} bytes"
            ),
        }
    }
}

/// The three axes that make up a sweep.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SweepPlan {
    payload: SweepAxis<u8>,
    retry_count: SweepAxis<u8>,
    retry_interval: SweepAxis<u16>,
}

impl SweepPlan {
    /// Builds a plan, rejecting payload lengths the radio path cannot carry.
    pub fn new(
        payload: SweepAxis<u8>,
        retry_count: SweepAxis<u8>,
        retry_interval: SweepAxis<u16>,
    ) -> Result<Self, SweepPlanError> {
        if payload.max() > MAX_PAYLOAD_LEN {
            return Err(SweepPlanError::PayloadTooLarge { max: payload.max() });
        }
        Ok(Self {
            payload,
            retry_count,
            retry_interval,
        })
    }

    pub(crate) const fn new_unchecked(
        payload: SweepAxis<u8>,
        retry_count: SweepAxis<u8>,
        retry_interval: SweepAxis<u16>,
    ) -> Self {
        Self {
            payload,
            retry_count,
            retry_interval,
        }
    }

    /// Payload length axis in bytes; varies fastest.
    pub fn payload(&self) -> &SweepAxis<u8> {
        &self.payload
    }

    /// Retries per broadcast.
    pub fn retry_count(&self) -> &SweepAxis<u8> {
        &self.retry_count
    }

    /// Gap between retries in milliseconds; varies slowest.
    pub fn retry_interval(&self) -> &SweepAxis<u16> {
        &self.retry_interval
    }

    /// All axes at their minimum.
    pub fn first(&self) -> SweepParameters {
        SweepParameters::new(
            self.payload.min(),
            self.retry_count.min(),
            self.retry_interval.min(),
        )
    }

    /// Returns `true` when every field of `params` lies within its axis.
    pub fn contains(&self, params: &SweepParameters) -> bool {
        self.payload.contains(params.payload_len)
            && self.retry_count.contains(params.retry_count)
            && self.retry_interval.contains(params.retry_interval_ms)
    }

    /// Odometer increment. `Finished` leaves the caller's parameters untouched.
    pub fn advance(&self, params: &SweepParameters) -> Advance {
        if let Some(payload_len) = self.payload.next_after(params.payload_len) {
            return Advance::Next(SweepParameters {
                payload_len,
                ..*params
            });
        }

        if let Some(retry_count) = self.retry_count.next_after(params.retry_count) {
            return Advance::Next(SweepParameters {
                payload_len: self.payload.min(),
                retry_count,
                ..*params
            });
        }

        match self.retry_interval.next_after(params.retry_interval_ms) {
            Some(retry_interval_ms) => Advance::Next(SweepParameters {
                payload_len: self.payload.min(),
                retry_count: self.retry_count.min(),
                retry_interval_ms,
            }),
            None => Advance::Finished,
        }
    }

    /// Total number of combinations (rows) the plan produces.
    pub fn combination_count(&self) -> u32 {
        self.payload
            .value_count()
            .saturating_mul(self.retry_count.value_count())
            .saturating_mul(self.retry_interval.value_count())
    }

    /// Iterates over every combination in odometer order.
    pub fn iter(&self) -> SweepIter {
        SweepIter {
            plan: *self,
            next: Some(self.first()),
        }
    }
}

impl IntoIterator for &SweepPlan {
    type Item = SweepParameters;
    type IntoIter = SweepIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`SweepPlan::iter`].
#[derive(Clone, Debug)]
pub struct SweepIter {
    plan: SweepPlan,
    next: Option<SweepParameters>,
}

impl Iterator for SweepIter {
    type Item = SweepParameters;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = match self.plan.advance(&current) {
            Advance::Next(params) => Some(params),
            Advance::Finished => None,
        };
        Some(current)
    }
}

/// Stateful wrapper that owns the current parameters for the lifetime of a run.
///
/// Once the plan is exhausted the sequencer latches: further calls to
/// [`advance`](Self::advance) keep returning [`Advance::Finished`].
#[derive(Clone, Debug)]
pub struct SweepSequencer {
    plan: SweepPlan,
    current: SweepParameters,
    finished: bool,
}

impl SweepSequencer {
    pub fn new(plan: SweepPlan) -> Self {
        Self {
            current: plan.first(),
            plan,
            finished: false,
        }
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub fn current(&self) -> SweepParameters {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Rewinds to the first combination.
    pub fn reset(&mut self) {
        self.current = self.plan.first();
        self.finished = false;
    }

    pub fn advance(&mut self) -> Advance {
        if self.finished {
            return Advance::Finished;
        }

        match self.plan.advance(&self.current) {
            Advance::Next(params) => {
                self.current = params;
                Advance::Next(params)
            }
            Advance::Finished => {
                self.finished = true;
                Advance::Finished
            }
        }
    }
}
