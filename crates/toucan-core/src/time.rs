// crates/toucan-core/src/time.rs
//
// RationalTime and TimeRange — the two value types every other module in
// the workspace measures time with. Kept free of serde on the arithmetic
// (timeline documents serialize their own JSON shape separately in
// `timeline::schema`) so this stays a plain value type, cheap to pass
// around and compare.

use serde::{Deserialize, Serialize};

/// A value measured at a given rate (frames or ticks per second).
///
/// Two `RationalTime`s are compared by rescaling to a common rate, never
/// by comparing `value` fields directly unless the rates already match.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct RationalTime {
    pub value: f64,
    pub rate:  f64,
}

impl RationalTime {
    pub fn new(value: f64, rate: f64) -> Self {
        Self { value, rate }
    }

    /// A time is invalid iff its rate is not strictly positive.
    pub fn is_invalid(&self) -> bool {
        self.rate <= 0.0
    }

    pub fn is_valid(&self) -> bool {
        !self.is_invalid()
    }

    /// Value rescaled to `rate`, assuming `self` is valid.
    pub fn value_at_rate(&self, rate: f64) -> f64 {
        if self.rate == rate {
            self.value
        } else {
            self.value * rate / self.rate
        }
    }

    /// Rescale to a different rate, preserving duration.
    pub fn rescaled_to(&self, rate: f64) -> Self {
        Self { value: self.value_at_rate(rate), rate }
    }

    pub fn to_seconds(&self) -> f64 {
        if self.rate <= 0.0 { 0.0 } else { self.value / self.rate }
    }

    pub fn from_seconds(seconds: f64, rate: f64) -> Self {
        Self { value: seconds * rate, rate }
    }

    pub fn floor(&self) -> Self {
        Self { value: self.value.floor(), rate: self.rate }
    }

    pub fn round(&self) -> Self {
        Self { value: self.value.round(), rate: self.rate }
    }

    /// `floor(value)` expressed as an integer frame number.
    pub fn frame_number(&self) -> i64 {
        self.value.floor() as i64
    }
}

impl std::ops::Add for RationalTime {
    type Output = RationalTime;
    fn add(self, rhs: RationalTime) -> RationalTime {
        let rate = self.rate;
        RationalTime::new(self.value + rhs.value_at_rate(rate), rate)
    }
}

impl std::ops::Sub for RationalTime {
    type Output = RationalTime;
    fn sub(self, rhs: RationalTime) -> RationalTime {
        let rate = self.rate;
        RationalTime::new(self.value - rhs.value_at_rate(rate), rate)
    }
}

impl PartialEq for RationalTime {
    /// Two times compare equal when their common-rate values agree, rescaled
    /// to the higher of the two rates to avoid losing precision.
    fn eq(&self, other: &Self) -> bool {
        let common = self.rate.max(other.rate).max(1.0);
        (self.value_at_rate(common) - other.value_at_rate(common)).abs() < 1e-6
    }
}

impl PartialOrd for RationalTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let a = self.to_seconds();
        let b = other.to_seconds();
        a.partial_cmp(&b)
    }
}

/// A half-open interval `[start, start + duration)`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start:    RationalTime,
    pub duration: RationalTime,
}

impl TimeRange {
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    /// End time, exclusive — the instant just past the last contained sample.
    pub fn end_exclusive(&self) -> RationalTime {
        self.start + self.duration
    }

    /// End time, inclusive — the last contained sample, one tick before
    /// `end_exclusive`.
    pub fn end_inclusive(&self) -> RationalTime {
        let rate = self.duration.rate;
        self.end_exclusive() - RationalTime::new(1.0, rate)
    }

    /// Half-open containment: `start <= t < end_exclusive`.
    pub fn contains(&self, t: RationalTime) -> bool {
        t >= self.start && t < self.end_exclusive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_exclusive_excludes_boundary() {
        let r = TimeRange::new(RationalTime::new(0.0, 24.0), RationalTime::new(24.0, 24.0));
        assert!(r.contains(RationalTime::new(0.0, 24.0)));
        assert!(r.contains(RationalTime::new(23.0, 24.0)));
        assert!(!r.contains(RationalTime::new(24.0, 24.0)));
    }

    #[test]
    fn rescale_preserves_seconds() {
        let t = RationalTime::new(48.0, 24.0);
        let rescaled = t.rescaled_to(48.0);
        assert!((rescaled.to_seconds() - t.to_seconds()).abs() < 1e-9);
        assert!((rescaled.value - 96.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_below_or_equal_zero_rate() {
        assert!(RationalTime::new(1.0, 0.0).is_invalid());
        assert!(RationalTime::new(1.0, -1.0).is_invalid());
        assert!(RationalTime::new(1.0, 24.0).is_valid());
    }

    #[test]
    fn frame_number_floors() {
        let t = RationalTime::new(12.9, 24.0);
        assert_eq!(t.frame_number(), 12);
    }
}
