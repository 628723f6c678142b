use chrono::{DateTime, Utc};
use core_types::{Rate, RateUnit, RankedEntry};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// The elapsed time between two boundaries and the unit rates are given in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBasis {
    pub hours: Decimal,
    pub unit: RateUnit,
}

impl RateBasis {
    /// `None` unless `to` is strictly after `from`.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<Self> {
        let seconds = (to - from).num_seconds();
        if seconds <= 0 {
            return None;
        }
        let hours = Decimal::from(seconds) / dec!(3600);
        let unit = if hours > dec!(24) {
            RateUnit::PerDay
        } else {
            RateUnit::PerHour
        };
        Some(Self { hours, unit })
    }

    /// The rate for a gain of `delta` over this interval.
    pub fn rate(&self, delta: i64) -> Option<Rate> {
        let per_hour_factor = match self.unit {
            RateUnit::PerHour => Decimal::ONE,
            RateUnit::PerDay => dec!(24),
        };
        let value = Decimal::from(delta)
            .checked_mul(per_hour_factor)?
            .checked_div(self.hours)?;
        Some(Rate {
            value,
            unit: self.unit,
        })
    }
}

/// Fills `rate` on every entry whose delta is known.
pub fn annotate_rates(entries: &mut [RankedEntry], basis: &RateBasis) {
    for entry in entries.iter_mut() {
        entry.rate = entry.metric_value.and_then(|delta| basis.rate(delta));
    }
}
