pub mod domain;
pub mod ports;
pub mod rates;
pub mod report;
pub mod sheet_date;

pub use domain::{
    DebtLine, DebtStatus, ExchangeRateSample, NotificationOutcome, PaymentForm, PaymentMethod,
    PaymentRecord, StudentLink, UserAccount,
};
pub use ports::{LedgerStore, NotificationService, PortError, PortResult, SweepLease};
pub use rates::{RateHistory, ResolvedRate};
pub use report::{ReportFilter, ReportSummary};
