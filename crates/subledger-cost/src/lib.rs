//! # subledger-cost
//!
//! Subscription storage and period cost aggregation for Subledger.
//!
//! This crate provides:
//! - [`SubscriptionDatabase`] - SQLite storage for subscription records
//! - [`SubscriptionFilter`] - conjunctive owner/service filters, usable in-process or as SQL
//! - [`PeriodAggregator`] - month-granular prorated cost over a query period
//! - [`SubscriptionService`] - validated CRUD and totals on top of the store
//!
//! ## Example
//!
//! ```no_run
//! use subledger_core::QueryPeriod;
//! use subledger_cost::{FilterCriteria, SubscriptionDatabase, SubscriptionService};
//!
//! fn main() -> subledger_cost::Result<()> {
//!     let db = SubscriptionDatabase::open("subscriptions.db")?;
//!     let service = SubscriptionService::new(&db);
//!
//!     let period = QueryPeriod::parse("01-2025", "12-2025")?;
//!     let criteria = FilterCriteria::new().with_service("Yandex Plus");
//!     let total = service.calculate_total(&criteria, &period)?;
//!     println!("total: {}", total.total_cost);
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod filter;
pub mod models;
pub mod period;
pub mod service;

// Re-export main types
pub use db::SubscriptionDatabase;
pub use error::{CostError, Result};
pub use filter::{FilterClause, SqlPredicate, SubscriptionFilter};
pub use models::{
    CostBreakdown, FilterCriteria, ListQuery, MAX_LIST_LIMIT, NewSubscription, Subscription,
    SubscriptionCost, SubscriptionUpdate, TotalCost,
};
pub use period::{PeriodAggregator, calculate_total};
pub use service::SubscriptionService;
