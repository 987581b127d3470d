//! One digit of the parameter odometer.
//!
//! An axis walks `min, min + step, ...` while the value stays `<= max`. The
//! last visited value is not necessarily `max` itself when `step` does not
//! divide the range evenly.

use core::fmt;

/// Integer types that can back a sweep axis.
pub trait AxisValue: Copy + Ord + fmt::Debug {
    /// Additive identity, used to reject zero steps.
    const ZERO: Self;

    /// Adds `step`, returning `None` on overflow.
    fn checked_step(self, step: Self) -> Option<Self>;

    /// Widens the value for counting combinations.
    fn widen(self) -> u32;
}

macro_rules! impl_axis_value {
    ($($ty:ty),*) => {
        $(
            impl AxisValue for $ty {
                const ZERO: Self = 0;

                fn checked_step(self, step: Self) -> Option<Self> {
                    self.checked_add(step)
                }

                fn widen(self) -> u32 {
                    u32::from(self)
                }
            }
        )*
    };
}

impl_axis_value!(u8, u16);

/// Reasons an axis definition is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SweepAxisError {
    /// `min` is greater than `max`.
    EmptyRange,
    /// A zero step never leaves `min`, so the sweep could not finish.
    ZeroStep,
}

impl fmt::Display for SweepAxisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepAxisError::EmptyRange => f.write_str("axis minimum exceeds maximum"),
            SweepAxisError::ZeroStep => f.write_str("axis step must be non-zero"),
        }
    }
}

/// Inclusive `[min, max]` range walked in fixed increments.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SweepAxis<T> {
    min: T,
    max: T,
    step: T,
}

impl<T: AxisValue> SweepAxis<T> {
    /// Builds a validated axis.
    pub fn new(min: T, max: T, step: T) -> Result<Self, SweepAxisError> {
        if min > max {
            return Err(SweepAxisError::EmptyRange);
        }
        if step == T::ZERO {
            return Err(SweepAxisError::ZeroStep);
        }
        Ok(Self { min, max, step })
    }

    /// Axis that only ever holds `value`.
    pub fn fixed(value: T, step: T) -> Result<Self, SweepAxisError> {
        Self::new(value, value, step)
    }

    /// First value visited.
    pub fn min(&self) -> T {
        self.min
    }

    /// Inclusive upper bound; the last visited value may fall short of it.
    pub fn max(&self) -> T {
        self.max
    }

    /// Increment between visited values, never zero.
    pub fn step(&self) -> T {
        self.step
    }

    /// Returns the next value on this axis, or `None` when it would pass `max`.
    pub fn next_after(&self, value: T) -> Option<T> {
        value
            .checked_step(self.step)
            .filter(|candidate| *candidate <= self.max)
    }

    /// Returns `true` when `value` lies within `[min, max]`.
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }

    /// Number of distinct values visited on this axis.
    pub fn value_count(&self) -> u32 {
        (self.max.widen() - self.min.widen()) / self.step.widen() + 1
    }
}

impl<T> SweepAxis<T> {
    /// Builds an axis without validation; callers must uphold `min <= max`
    /// and `step > 0`.
    pub(crate) const fn new_unchecked(min: T, max: T, step: T) -> Self {
        Self { min, max, step }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_range() {
        assert_eq!(
            SweepAxis::<u8>::new(10, 5, 1),
            Err(SweepAxisError::EmptyRange)
        );
    }

    #[test]
    fn rejects_zero_step_even_for_single_value() {
        assert_eq!(SweepAxis::<u16>::fixed(7, 0), Err(SweepAxisError::ZeroStep));
    }

    #[test]
    fn next_after_stops_before_exceeding_max() {
        let axis = SweepAxis::<u16>::new(1, 10, 2).unwrap();
        assert_eq!(axis.next_after(1), Some(3));
        assert_eq!(axis.next_after(9), None);
        assert_eq!(axis.value_count(), 5);
    }

    #[test]
    fn overflow_counts_as_exhausted() {
        let axis = SweepAxis::<u8>::new(250, 255, 4).unwrap();
        assert_eq!(axis.next_after(254), None);
        assert_eq!(axis.next_after(250), Some(254));
        assert_eq!(axis.value_count(), 2);
    }
}
