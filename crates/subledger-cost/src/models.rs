//! Data models for subscription tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subledger_core::CalendarMonth;
use uuid::Uuid;

pub use subledger_core::MAX_LIST_LIMIT;

/// A recurring paid subscription.
///
/// Field names on the wire follow the service's JSON schema (`user_id`,
/// `start_date`, `end_date`), months are rendered as `MM-YYYY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier
    pub id: Uuid,

    /// Name of the subscribed service (e.g., "Yandex Plus")
    pub service_name: String,

    /// Monthly price in whole currency units
    pub price: u32,

    /// Owning user
    #[serde(rename = "user_id")]
    pub owner_id: Uuid,

    /// First billed month
    #[serde(rename = "start_date")]
    pub start_period: CalendarMonth,

    /// Last billed month; `None` while the subscription is still running
    #[serde(rename = "end_date", default, skip_serializing_if = "Option::is_none")]
    pub end_period: Option<CalendarMonth>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Create an open-ended subscription with a fresh id and timestamps.
    pub fn new(
        service_name: impl Into<String>,
        price: u32,
        owner_id: Uuid,
        start_period: CalendarMonth,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            service_name: service_name.into(),
            price,
            owner_id,
            start_period,
            end_period: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the last billed month.
    pub fn with_end(mut self, end_period: CalendarMonth) -> Self {
        self.end_period = Some(end_period);
        self
    }

    /// Whether the subscription has no defined end.
    pub fn is_open_ended(&self) -> bool {
        self.end_period.is_none()
    }
}

/// Request to create a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    pub service_name: String,
    pub price: u32,
    #[serde(rename = "user_id")]
    pub owner_id: Uuid,
    #[serde(rename = "start_date")]
    pub start_period: CalendarMonth,
    #[serde(rename = "end_date", default)]
    pub end_period: Option<CalendarMonth>,
}

impl NewSubscription {
    /// Materialize into a subscription with a fresh id and timestamps.
    pub fn into_subscription(self) -> Subscription {
        let sub = Subscription::new(
            self.service_name,
            self.price,
            self.owner_id,
            self.start_period,
        );
        Subscription {
            end_period: self.end_period,
            ..sub
        }
    }
}

/// Partial update; absent fields keep their current value.
///
/// An end month can be set or moved but not cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub price: Option<u32>,
    #[serde(rename = "start_date", default)]
    pub start_period: Option<CalendarMonth>,
    #[serde(rename = "end_date", default)]
    pub end_period: Option<CalendarMonth>,
}

impl SubscriptionUpdate {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.service_name.is_none()
            && self.price.is_none()
            && self.start_period.is_none()
            && self.end_period.is_none()
    }

    /// Overwrite the present fields of `sub`.
    pub fn apply_to(&self, sub: &mut Subscription) {
        if let Some(name) = &self.service_name {
            sub.service_name = name.clone();
        }
        if let Some(price) = self.price {
            sub.price = price;
        }
        if let Some(start) = self.start_period {
            sub.start_period = start;
        }
        if let Some(end) = self.end_period {
            sub.end_period = Some(end);
        }
    }
}

/// Optional, independently specified subscription filters.
///
/// `owner_id` is kept as raw text; it is validated when the filter is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(rename = "user_id", default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
}

impl FilterCriteria {
    /// Criteria that match everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one owner.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Restrict to one service name (exact match).
    pub fn with_service(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }
}

/// Paginated listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(flatten)]
    pub criteria: FilterCriteria,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    MAX_LIST_LIMIT
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            criteria: FilterCriteria::default(),
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl ListQuery {
    /// Listing with the given criteria and default paging.
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            ..Self::default()
        }
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the page offset.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// Aggregated cost for a query period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalCost {
    pub total_cost: u64,
}

/// One subscription's share of a period total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCost {
    /// Subscription id
    pub id: Uuid,

    /// Service name
    pub service_name: String,

    /// Whole months billed inside the period
    pub months: u64,

    /// `price * months`
    pub cost: u64,
}

/// A period total together with the contributions it is made of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total_cost: u64,
    pub subscriptions: Vec<SubscriptionCost>,
}
