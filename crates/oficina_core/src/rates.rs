//! crates/oficina_core/src/rates.rs
//!
//! Exchange-rate samples as an ordered time series. "Current rate" is the
//! `latest()` query, never ambient state.

use chrono::{DateTime, Utc};

use crate::domain::ExchangeRateSample;
use crate::sheet_date::parse_sheet_date;

/// A rate resolved from the history, with the instant it was recorded if known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRate {
    pub rate: f64,
    pub date: Option<DateTime<Utc>>,
}

/// The Config table's samples, in table order.
#[derive(Debug, Clone, Default)]
pub struct RateHistory {
    samples: Vec<ExchangeRateSample>,
}

impl RateHistory {
    pub fn new(samples: Vec<ExchangeRateSample>) -> Self {
        Self { samples }
    }

    /// The sample with the greatest parseable date. Ties keep the earlier row.
    /// When no row has a parseable date, the last row in table order wins.
    pub fn latest(&self) -> Option<ResolvedRate> {
        self.best_at_or_before(None).or_else(|| {
            self.samples.last().map(|last| ResolvedRate {
                rate: last.rate,
                date: parse_sheet_date(&last.recorded_on),
            })
        })
    }

    /// The rate in force at `at`: the latest dated sample not after it.
    pub fn at(&self, at: DateTime<Utc>) -> Option<ResolvedRate> {
        self.best_at_or_before(Some(at))
    }

    fn best_at_or_before(&self, limit: Option<DateTime<Utc>>) -> Option<ResolvedRate> {
        let mut best: Option<ResolvedRate> = None;
        for sample in &self.samples {
            let Some(date) = parse_sheet_date(&sample.recorded_on) else {
                continue;
            };
            if limit.is_some_and(|limit| date > limit) {
                continue;
            }
            let newer = match best {
                Some(ResolvedRate { date: Some(current), .. }) => date > current,
                _ => true,
            };
            if newer {
                best = Some(ResolvedRate {
                    rate: sample.rate,
                    date: Some(date),
                });
            }
        }
        best
    }
}

/// Converts a USD amount to local currency at `rate`, rounded to cents.
pub fn convert_to_local(amount_usd: f64, rate: f64) -> f64 {
    round_cents(amount_usd * rate)
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
