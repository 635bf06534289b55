//! # subledger-core
//!
//! Core types, errors, and utilities for Subledger.
//!
//! This crate provides:
//! - [`CalendarMonth`] and [`QueryPeriod`] - month-granular billing periods
//! - [`LedgerError`] - the `InvalidArgument` error taxonomy of the ledger core
//! - [`logging`] - tracing setup
//!
//! ## Example
//!
//! ```no_run
//! use subledger_core::{CalendarMonth, QueryPeriod};
//!
//! fn main() -> subledger_core::Result<()> {
//!     let _guard = subledger_core::init_logging(None, false)?;
//!
//!     let period = QueryPeriod::parse("01-2025", "12-2025")?;
//!     let july: CalendarMonth = "07-2025".parse()?;
//!     assert!(period.start < july && july < period.end);
//!     assert_eq!(period.len_months(), 12);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod month;

// Re-export main types for convenience
pub use error::{LedgerError, Result};
pub use logging::{LogGuard, init_logging};
pub use month::{CalendarMonth, QueryPeriod};

/// Largest page size a subscription listing may request, and the default one.
pub const MAX_LIST_LIMIT: u32 = 100;
