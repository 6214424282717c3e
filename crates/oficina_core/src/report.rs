//! crates/oficina_core/src/report.rs
//!
//! Aggregate payment reports: date or month filtering, an optional payment
//! method filter, and grouped sums.

use chrono::{DateTime, Datelike, Utc};

use crate::domain::{PaymentMethod, PaymentRecord};
use crate::sheet_date::parse_sheet_date;

const MONTH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReportFilterError {
    #[error("Mes inválido: {0}")]
    InvalidMonth(String),
    #[error("Fecha inválida: {0}")]
    InvalidDate(String),
}

/// Resolves a Spanish month name (any case) or a number 1-12 to its month number.
pub fn month_number(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    let lowered = raw.to_lowercase();
    let lowered = if lowered == "setiembre" { "septiembre".to_string() } else { lowered };
    MONTH_NAMES
        .iter()
        .position(|name| *name == lowered)
        .map(|idx| idx as u32 + 1)
}

//=========================================================================================
// Filter
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DateFilter {
    Any,
    Month(u32),
    /// Inclusive on both ends; a missing bound is open.
    Range {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportFilter {
    pub date: DateFilter,
    pub payment_method: Option<PaymentMethod>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ReportFilter {
    /// Builds a filter from the raw request fields. Blank strings count as absent.
    /// Any range bound wins over a month.
    pub fn from_parts(
        month: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        payment_method: Option<&str>,
    ) -> Result<Self, ReportFilterError> {
        let start_date = present(start_date);
        let end_date = present(end_date);

        let date = if start_date.is_some() || end_date.is_some() {
            let parse = |raw: &str| {
                parse_sheet_date(raw).ok_or_else(|| ReportFilterError::InvalidDate(raw.to_string()))
            };
            DateFilter::Range {
                start: start_date.map(parse).transpose()?,
                end: end_date.map(parse).transpose()?,
            }
        } else if let Some(month) = present(month) {
            let n = month_number(month)
                .ok_or_else(|| ReportFilterError::InvalidMonth(month.to_string()))?;
            DateFilter::Month(n)
        } else {
            DateFilter::Any
        };

        Ok(Self {
            date,
            payment_method: present(payment_method).map(PaymentMethod::from_label),
        })
    }

    fn date_matches(&self, payment_date: Option<DateTime<Utc>>) -> bool {
        match (&self.date, payment_date) {
            (DateFilter::Any, _) => true,
            (_, None) => false,
            (DateFilter::Month(month), Some(date)) => date.month() == *month,
            (DateFilter::Range { start, end }, Some(date)) => {
                start.map_or(true, |start| date >= start) && end.map_or(true, |end| date <= end)
            }
        }
    }

    pub fn matches(&self, payment: &PaymentRecord) -> bool {
        if let Some(method) = &self.payment_method {
            if &payment.payment_method != method {
                return false;
            }
        }
        self.date_matches(parse_sheet_date(&payment.payment_date))
    }
}

//=========================================================================================
// Aggregation
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownEntry {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportSummary {
    pub total_amount: f64,
    pub count: usize,
    /// In order of first appearance.
    pub breakdown: Vec<BreakdownEntry>,
}

impl ReportSummary {
    fn add(&mut self, category: &str, amount: f64) {
        self.total_amount += amount;
        self.count += 1;
        match self.breakdown.iter_mut().find(|entry| entry.category == category) {
            Some(entry) => entry.amount += amount,
            None => self.breakdown.push(BreakdownEntry {
                category: category.to_string(),
                amount,
            }),
        }
    }
}

/// Sums USD amounts over the matching payments. The breakdown is keyed by
/// payment method, or by the paid-months string when a method filter is set.
pub fn aggregate<'a, I>(payments: I, filter: &ReportFilter) -> ReportSummary
where
    I: IntoIterator<Item = &'a PaymentRecord>,
{
    let mut summary = ReportSummary::default();
    for payment in payments.into_iter().filter(|p| filter.matches(p)) {
        let category = if filter.payment_method.is_some() {
            payment.paid_months.as_str()
        } else {
            payment.payment_method.label()
        };
        summary.add(category, payment.amount_usd);
    }
    summary
}
