//! Subscription service: validation, logging, and cost calculation on top of
//! [`SubscriptionDatabase`].

use chrono::Utc;
use subledger_core::{QueryPeriod, log_ledger_event};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db::SubscriptionDatabase;
use crate::error::{CostError, Result};
use crate::filter::SubscriptionFilter;
use crate::models::{
    CostBreakdown, FilterCriteria, ListQuery, MAX_LIST_LIMIT, NewSubscription, Subscription,
    SubscriptionUpdate, TotalCost,
};
use crate::period::PeriodAggregator;

/// High-level operations on the subscription ledger.
pub struct SubscriptionService<'a> {
    db: &'a SubscriptionDatabase,
}

impl<'a> SubscriptionService<'a> {
    /// Create a service over an open database.
    pub fn new(db: &'a SubscriptionDatabase) -> Self {
        Self { db }
    }

    /// Validate and store a new subscription.
    pub fn create(&self, request: NewSubscription) -> Result<Subscription> {
        let sub = request.into_subscription();
        validate(&sub)?;

        if let Err(e) = self.db.insert(&sub) {
            error!(
                user_id = %sub.owner_id,
                service = %sub.service_name,
                error = %e,
                "failed to create subscription"
            );
            return Err(e);
        }

        log_ledger_event!(
            "created",
            id = %sub.id,
            user_id = %sub.owner_id,
            service = %sub.service_name,
            open_ended = sub.is_open_ended()
        );
        Ok(sub)
    }

    /// Fetch a subscription by id.
    pub fn get(&self, id: Uuid) -> Result<Subscription> {
        match self.db.get(id) {
            Ok(Some(sub)) => Ok(sub),
            Ok(None) => Err(CostError::NotFound { id }),
            Err(e) => {
                error!(%id, error = %e, "failed to get subscription");
                Err(e)
            }
        }
    }

    /// Apply a partial update and return the stored result.
    pub fn update(&self, id: Uuid, update: SubscriptionUpdate) -> Result<Subscription> {
        let mut sub = self.get(id)?;
        if update.is_empty() {
            debug!(%id, "empty update, nothing to store");
            return Ok(sub);
        }

        update.apply_to(&mut sub);
        validate(&sub)?;
        sub.updated_at = Utc::now();

        if let Err(e) = self.db.update(&sub) {
            error!(%id, error = %e, "failed to update subscription");
            return Err(e);
        }

        log_ledger_event!("updated", id = %sub.id);
        Ok(sub)
    }

    /// Delete a subscription.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        if let Err(e) = self.db.delete(id) {
            error!(%id, error = %e, "failed to delete subscription");
            return Err(e);
        }

        log_ledger_event!("deleted", %id);
        Ok(())
    }

    /// List subscriptions matching the query's criteria, newest first.
    pub fn list(&self, query: &ListQuery) -> Result<Vec<Subscription>> {
        if query.limit == 0 || query.limit > MAX_LIST_LIMIT {
            return Err(CostError::validation(
                "limit",
                format!("must be between 1 and {MAX_LIST_LIMIT}, got {}", query.limit),
            ));
        }

        let filter = SubscriptionFilter::from_criteria(&query.criteria)?;
        self.db
            .list(&filter, query.limit, query.offset)
            .inspect_err(|e| error!(error = %e, "failed to list subscriptions"))
    }

    /// Total prorated cost of matching subscriptions over `period`.
    ///
    /// A reversed period yields zero without touching storage.
    pub fn calculate_total(
        &self,
        criteria: &FilterCriteria,
        period: &QueryPeriod,
    ) -> Result<TotalCost> {
        let (filter, candidates) = self.candidates(criteria, period)?;
        let total_cost = PeriodAggregator::new(*period).total(&candidates);

        info!(
            total = total_cost,
            candidates = candidates.len(),
            clauses = filter.clauses().len(),
            start = %period.start,
            end = %period.end,
            months = period.len_months(),
            "total calculated"
        );
        Ok(TotalCost { total_cost })
    }

    /// Period total plus per-subscription contributions.
    ///
    /// Both are computed from one candidate read, so the total always equals
    /// the sum of the listed costs.
    pub fn cost_breakdown(
        &self,
        criteria: &FilterCriteria,
        period: &QueryPeriod,
    ) -> Result<CostBreakdown> {
        let (_, candidates) = self.candidates(criteria, period)?;
        let aggregator = PeriodAggregator::new(*period);
        let breakdown = CostBreakdown {
            total_cost: aggregator.total(&candidates),
            subscriptions: aggregator.breakdown(&candidates),
        };

        info!(
            total = breakdown.total_cost,
            subscriptions = breakdown.subscriptions.len(),
            months = period.len_months(),
            "breakdown calculated"
        );
        Ok(breakdown)
    }

    fn candidates(
        &self,
        criteria: &FilterCriteria,
        period: &QueryPeriod,
    ) -> Result<(SubscriptionFilter, Vec<Subscription>)> {
        let filter = SubscriptionFilter::from_criteria(criteria)?;

        if period.is_empty() {
            debug!(start = %period.start, end = %period.end, "reversed query period");
            return Ok((filter, Vec::new()));
        }

        let candidates = self
            .db
            .find_overlapping(&filter, period)
            .inspect_err(|e| error!(error = %e, "failed to calculate total"))?;
        Ok((filter, candidates))
    }
}

/// Check the invariants every stored subscription must satisfy.
fn validate(sub: &Subscription) -> Result<()> {
    if sub.service_name.trim().is_empty() {
        return Err(CostError::validation("service_name", "must not be empty"));
    }
    if let Some(end) = sub.end_period
        && end < sub.start_period
    {
        return Err(CostError::validation(
            "end_date",
            format!("{end} is before start date {}", sub.start_period),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use subledger_core::CalendarMonth;

    fn m(raw: &str) -> CalendarMonth {
        raw.parse().unwrap()
    }

    fn request(service: &str, price: u32, owner: Uuid, start: &str) -> NewSubscription {
        NewSubscription {
            service_name: service.to_string(),
            price,
            owner_id: owner,
            start_period: m(start),
            end_period: None,
        }
    }

    #[test]
    fn test_create_and_get() {
        subledger_core::logging::init_test_logging();
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let service = SubscriptionService::new(&db);

        let created = service
            .create(request("Yandex Plus", 400, Uuid::new_v4(), "07-2025"))
            .unwrap();
        let loaded = service.get(created.id).unwrap();
        assert_eq!(loaded.service_name, "Yandex Plus");
        assert!(loaded.is_open_ended());
    }

    #[test]
    fn test_create_rejects_blank_service_name() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let err = SubscriptionService::new(&db)
            .create(request("   ", 400, Uuid::new_v4(), "07-2025"))
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn test_create_rejects_end_before_start() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let mut req = request("Netflix", 250, Uuid::new_v4(), "07-2025");
        req.end_period = Some(m("06-2025"));

        let err = SubscriptionService::new(&db).create(req).unwrap_err();
        assert!(matches!(err, CostError::Validation { ref field, .. } if field == "end_date"));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let err = SubscriptionService::new(&db).get(Uuid::new_v4()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_merges_fields() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let service = SubscriptionService::new(&db);
        let created = service
            .create(request("Netflix", 250, Uuid::new_v4(), "01-2025"))
            .unwrap();

        let updated = service
            .update(
                created.id,
                SubscriptionUpdate {
                    end_period: Some(m("03-2025")),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.price, 250);
        assert_eq!(updated.end_period, Some(m("03-2025")));
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(service.get(created.id).unwrap().end_period, Some(m("03-2025")));
    }

    #[test]
    fn test_update_revalidates_merged_record() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let service = SubscriptionService::new(&db);
        let mut req = request("Netflix", 250, Uuid::new_v4(), "01-2025");
        req.end_period = Some(m("03-2025"));
        let created = service.create(req).unwrap();

        let err = service
            .update(
                created.id,
                SubscriptionUpdate {
                    start_period: Some(m("05-2025")),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(service.get(created.id).unwrap().start_period, m("01-2025"));
    }

    #[test]
    fn test_empty_update_leaves_record_untouched() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let service = SubscriptionService::new(&db);
        let created = service
            .create(request("Netflix", 250, Uuid::new_v4(), "01-2025"))
            .unwrap();

        let same = service
            .update(created.id, SubscriptionUpdate::default())
            .unwrap();
        assert_eq!(same.id, created.id);
        assert_eq!(same.price, 250);
        assert_eq!(
            same.updated_at.timestamp_micros(),
            created.updated_at.timestamp_micros()
        );
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let err = SubscriptionService::new(&db)
            .update(Uuid::new_v4(), SubscriptionUpdate::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let err = SubscriptionService::new(&db).delete(Uuid::new_v4()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_validates_limit() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let service = SubscriptionService::new(&db);

        for limit in [0, MAX_LIST_LIMIT + 1] {
            let query = ListQuery::default().with_limit(limit);
            let err = service.list(&query).unwrap_err();
            assert!(matches!(err, CostError::Validation { ref field, .. } if field == "limit"));
        }
        assert!(service.list(&ListQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn test_list_rejects_bad_owner() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let query = ListQuery::new(FilterCriteria::new().with_owner("nope"));
        let err = SubscriptionService::new(&db).list(&query).unwrap_err();
        assert!(matches!(err, CostError::Ledger(_)));
    }

    #[test]
    fn test_calculate_total_with_filters() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let service = SubscriptionService::new(&db);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        service.create(request("Yandex Plus", 400, alice, "07-2025")).unwrap();
        let mut netflix = request("Netflix", 250, alice, "01-2025");
        netflix.end_period = Some(m("12-2025"));
        service.create(netflix).unwrap();
        service.create(request("Yandex Plus", 100, bob, "01-2025")).unwrap();

        let year = QueryPeriod::parse("01-2025", "12-2025").unwrap();

        let alice_total = service
            .calculate_total(&FilterCriteria::new().with_owner(alice.to_string()), &year)
            .unwrap();
        assert_eq!(alice_total.total_cost, 5400);

        let yandex_total = service
            .calculate_total(&FilterCriteria::new().with_service("Yandex Plus"), &year)
            .unwrap();
        assert_eq!(yandex_total.total_cost, 2400 + 1200);

        let reversed = QueryPeriod::parse("12-2025", "01-2025").unwrap();
        assert_eq!(
            service
                .calculate_total(&FilterCriteria::new(), &reversed)
                .unwrap()
                .total_cost,
            0
        );
    }

    #[test]
    fn test_calculate_total_rejects_bad_owner_even_for_reversed_period() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let reversed = QueryPeriod::parse("12-2025", "01-2025").unwrap();
        let err = SubscriptionService::new(&db)
            .calculate_total(&FilterCriteria::new().with_owner("bad"), &reversed)
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_cost_breakdown() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let service = SubscriptionService::new(&db);
        let owner = Uuid::new_v4();
        let created = service.create(request("Yandex Plus", 400, owner, "07-2025")).unwrap();

        let year = QueryPeriod::parse("01-2025", "12-2025").unwrap();
        let report = service.cost_breakdown(&FilterCriteria::new(), &year).unwrap();
        assert_eq!(report.total_cost, 2400);
        assert_eq!(report.subscriptions.len(), 1);
        assert_eq!(report.subscriptions[0].id, created.id);
        assert_eq!(report.subscriptions[0].months, 6);
        assert_eq!(report.subscriptions[0].cost, 2400);
    }

    #[test]
    fn test_cost_breakdown_total_matches_its_entries() {
        let db = SubscriptionDatabase::open_in_memory().unwrap();
        let service = SubscriptionService::new(&db);
        let owner = Uuid::new_v4();

        service.create(request("Yandex Plus", 400, owner, "07-2025")).unwrap();
        let mut netflix = request("Netflix", 250, owner, "01-2025");
        netflix.end_period = Some(m("12-2025"));
        service.create(netflix).unwrap();
        let mut old = request("Spotify", 169, owner, "01-2023");
        old.end_period = Some(m("12-2023"));
        service.create(old).unwrap();

        let year = QueryPeriod::parse("01-2025", "12-2025").unwrap();
        let criteria = FilterCriteria::new();
        let report = service.cost_breakdown(&criteria, &year).unwrap();

        let summed: u64 = report.subscriptions.iter().map(|row| row.cost).sum();
        assert_eq!(report.total_cost, summed);
        assert_eq!(report.total_cost, 5400);
        assert_eq!(report.subscriptions.len(), 2);
        assert_eq!(
            service.calculate_total(&criteria, &year).unwrap().total_cost,
            report.total_cost
        );

        let reversed = QueryPeriod::parse("12-2025", "01-2025").unwrap();
        let empty = service.cost_breakdown(&criteria, &reversed).unwrap();
        assert_eq!(empty.total_cost, 0);
        assert!(empty.subscriptions.is_empty());
    }
}
