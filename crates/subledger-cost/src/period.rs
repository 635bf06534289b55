//! Period-overlap cost aggregation.
//!
//! For a subscription `s` and a query period `[qs, qe]`:
//!
//! ```text
//! effective_start = max(s.start, qs)
//! effective_end   = min(s.end ?? qe, qe)
//! months          = months_between(effective_start, effective_end) + 1
//! contribution    = s.price * months          (0 when effective_end < effective_start)
//! ```
//!
//! Billing is month-granular and inclusive: any activity in a month bills the
//! whole month. An open-ended subscription is clipped to the query end only.
//! A reversed period (`qs > qe`) overlaps nothing and totals 0.
//!
//! ## Example
//!
//! ```
//! use subledger_core::QueryPeriod;
//! use subledger_cost::{PeriodAggregator, Subscription};
//! use uuid::Uuid;
//!
//! let sub = Subscription::new("Yandex Plus", 400, Uuid::new_v4(), "07-2025".parse().unwrap());
//! let year = QueryPeriod::parse("01-2025", "12-2025").unwrap();
//!
//! assert_eq!(PeriodAggregator::new(year).total([&sub]), 2400);
//! ```

use subledger_core::{CalendarMonth, QueryPeriod};

use crate::error::Result;
use crate::filter::SubscriptionFilter;
use crate::models::{FilterCriteria, Subscription, SubscriptionCost, TotalCost};

/// Computes prorated costs of subscriptions over one query period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodAggregator {
    period: QueryPeriod,
}

impl PeriodAggregator {
    /// Create an aggregator for the given period.
    pub fn new(period: QueryPeriod) -> Self {
        Self { period }
    }

    /// Clipped `[start, end]` of the subscription inside the period, if any.
    pub fn overlap(&self, sub: &Subscription) -> Option<(CalendarMonth, CalendarMonth)> {
        let QueryPeriod { start: qs, end: qe } = self.period;

        if self.period.is_empty() {
            return None;
        }

        // Fast reject: starts after the window or ended before it.
        if sub.start_period > qe || sub.end_period.is_some_and(|end| end < qs) {
            return None;
        }

        let effective_start = sub.start_period.max(qs);
        let effective_end = sub.end_period.unwrap_or(qe).min(qe);

        if effective_end < effective_start {
            return None;
        }
        Some((effective_start, effective_end))
    }

    /// Whole months the subscription is billed inside the period.
    pub fn overlap_months(&self, sub: &Subscription) -> u64 {
        match self.overlap(sub) {
            // effective_end >= effective_start, so the difference is non-negative
            Some((start, end)) => start.months_until(&end) as u64 + 1,
            None => 0,
        }
    }

    /// `price * overlap_months`.
    pub fn contribution(&self, sub: &Subscription) -> u64 {
        u64::from(sub.price).saturating_mul(self.overlap_months(sub))
    }

    /// Sum of contributions.
    ///
    /// Integer arithmetic saturating at `u64::MAX`, so the result does not
    /// depend on iteration order.
    pub fn total<'a, I>(&self, subscriptions: I) -> u64
    where
        I: IntoIterator<Item = &'a Subscription>,
    {
        if self.period.is_empty() {
            return 0;
        }
        subscriptions
            .into_iter()
            .map(|sub| self.contribution(sub))
            .fold(0u64, u64::saturating_add)
    }

    /// Per-subscription contributions for subscriptions that overlap the
    /// period, in input order.
    pub fn breakdown<'a, I>(&self, subscriptions: I) -> Vec<SubscriptionCost>
    where
        I: IntoIterator<Item = &'a Subscription>,
    {
        subscriptions
            .into_iter()
            .filter_map(|sub| {
                let months = self.overlap_months(sub);
                (months > 0).then(|| SubscriptionCost {
                    id: sub.id,
                    service_name: sub.service_name.clone(),
                    months,
                    cost: u64::from(sub.price).saturating_mul(months),
                })
            })
            .collect()
    }
}

/// Total cost of the subscriptions matching `criteria` over `period`.
///
/// The filter is built first, so a malformed criterion fails before any cost
/// is computed. `subscriptions` may be a superset of the matching set; the
/// filter is applied in-process.
pub fn calculate_total<'a, I>(
    criteria: &FilterCriteria,
    period: &QueryPeriod,
    subscriptions: I,
) -> Result<TotalCost>
where
    I: IntoIterator<Item = &'a Subscription>,
{
    let filter = SubscriptionFilter::from_criteria(criteria)?;
    let aggregator = PeriodAggregator::new(*period);

    let total_cost = aggregator.total(
        subscriptions
            .into_iter()
            .filter(|sub| filter.matches(sub)),
    );

    Ok(TotalCost { total_cost })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn m(raw: &str) -> CalendarMonth {
        raw.parse().unwrap()
    }

    fn period(start: &str, end: &str) -> PeriodAggregator {
        PeriodAggregator::new(QueryPeriod::parse(start, end).unwrap())
    }

    fn open(price: u32, start: &str) -> Subscription {
        Subscription::new("Yandex Plus", price, Uuid::nil(), m(start))
    }

    fn closed(price: u32, start: &str, end: &str) -> Subscription {
        open(price, start).with_end(m(end))
    }

    #[test]
    fn test_open_ended_clipped_to_query_end() {
        let sub = open(400, "07-2025");
        let agg = period("01-2025", "12-2025");
        assert_eq!(agg.overlap(&sub), Some((m("07-2025"), m("12-2025"))));
        assert_eq!(agg.overlap_months(&sub), 6);
        assert_eq!(agg.total([&sub]), 2400);
    }

    #[test]
    fn test_single_month_window_inside_subscription() {
        let sub = closed(400, "07-2025", "09-2025");
        assert_eq!(period("08-2025", "08-2025").total([&sub]), 400);
    }

    #[test]
    fn test_disjoint_subscription_contributes_nothing() {
        let sub = closed(400, "01-2025", "03-2025");
        let agg = period("06-2025", "12-2025");
        assert_eq!(agg.overlap(&sub), None);
        assert_eq!(agg.total([&sub]), 0);
    }

    #[test]
    fn test_two_subscriptions_sum() {
        let subs = vec![open(400, "07-2025"), closed(250, "01-2025", "12-2025")];
        assert_eq!(period("01-2025", "12-2025").total(&subs), 5400);
    }

    #[test]
    fn test_reversed_period_is_zero() {
        let subs = vec![open(400, "01-2020"), closed(250, "01-2025", "12-2025")];
        let agg = period("12-2025", "01-2025");
        assert_eq!(agg.total(&subs), 0);
        assert!(agg.breakdown(&subs).is_empty());
    }

    #[test]
    fn test_starts_after_window() {
        let sub = open(100, "01-2026");
        assert_eq!(period("01-2025", "12-2025").contribution(&sub), 0);
    }

    #[test]
    fn test_ends_on_first_month_of_window() {
        let sub = closed(100, "01-2024", "01-2025");
        assert_eq!(period("01-2025", "12-2025").overlap_months(&sub), 1);
    }

    #[test]
    fn test_starts_on_last_month_of_window() {
        let sub = open(100, "12-2025");
        assert_eq!(period("01-2025", "12-2025").overlap_months(&sub), 1);
    }

    #[test]
    fn test_single_month_subscription() {
        let sub = closed(300, "05-2025", "05-2025");
        assert_eq!(period("05-2025", "05-2025").total([&sub]), 300);
        assert_eq!(period("01-2025", "12-2025").total([&sub]), 300);
        assert_eq!(period("06-2025", "12-2025").total([&sub]), 0);
    }

    #[test]
    fn test_window_across_year_boundary() {
        let sub = closed(100, "10-2024", "03-2025");
        assert_eq!(period("11-2024", "02-2025").overlap_months(&sub), 4);
    }

    #[test]
    fn test_zero_price_contributes_zero() {
        let sub = open(0, "01-2025");
        let agg = period("01-2025", "12-2025");
        assert_eq!(agg.overlap_months(&sub), 12);
        assert_eq!(agg.contribution(&sub), 0);
    }

    #[test]
    fn test_breakdown_lists_only_overlapping() {
        let subs = vec![
            open(400, "07-2025"),
            closed(250, "01-2024", "06-2024"),
            closed(100, "03-2025", "04-2025"),
        ];
        let rows = period("01-2025", "12-2025").breakdown(&subs);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].months, 6);
        assert_eq!(rows[0].cost, 2400);
        assert_eq!(rows[1].months, 2);
        assert_eq!(rows[1].cost, 200);
    }

    #[test]
    fn test_calculate_total_applies_criteria() {
        let alice = Uuid::new_v4();
        let mut a = open(400, "07-2025");
        a.owner_id = alice;
        let b = closed(250, "01-2025", "12-2025");

        let period = QueryPeriod::parse("01-2025", "12-2025").unwrap();
        let criteria = FilterCriteria::new().with_owner(alice.to_string());

        let total = calculate_total(&criteria, &period, [&a, &b]).unwrap();
        assert_eq!(total.total_cost, 2400);

        let everything = calculate_total(&FilterCriteria::new(), &period, [&a, &b]).unwrap();
        assert_eq!(everything.total_cost, 5400);
    }

    #[test]
    fn test_calculate_total_rejects_bad_owner() {
        let period = QueryPeriod::parse("01-2025", "12-2025").unwrap();
        let criteria = FilterCriteria::new().with_owner("12345");
        let err = calculate_total(&criteria, &period, [&open(400, "01-2025")]).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    fn month_strategy() -> impl Strategy<Value = CalendarMonth> {
        (2020i32..2030, 1u32..=12).prop_map(|(y, mo)| CalendarMonth::new(y, mo).unwrap())
    }

    fn subscription_strategy() -> impl Strategy<Value = Subscription> {
        (0u32..10_000, month_strategy(), proptest::option::of(0u32..60)).prop_map(
            |(price, start, extra)| {
                let sub = Subscription::new("svc", price, Uuid::nil(), start);
                match extra {
                    Some(n) => {
                        let ordinal = start.year() * 12 + start.month() as i32 - 1 + n as i32;
                        let end = CalendarMonth::new(ordinal / 12, (ordinal % 12) as u32 + 1)
                            .unwrap();
                        sub.with_end(end)
                    }
                    None => sub,
                }
            },
        )
    }

    proptest! {
        #[test]
        fn prop_reversed_period_totals_zero(
            subs in proptest::collection::vec(subscription_strategy(), 0..20),
            a in month_strategy(),
            b in month_strategy(),
        ) {
            prop_assume!(a != b);
            let (start, end) = if a > b { (a, b) } else { (b, a) };
            let agg = PeriodAggregator::new(QueryPeriod::new(start, end));
            prop_assert_eq!(agg.total(&subs), 0);
        }

        #[test]
        fn prop_order_independent(
            subs in proptest::collection::vec(subscription_strategy(), 0..20),
            a in month_strategy(),
            b in month_strategy(),
        ) {
            let agg = PeriodAggregator::new(QueryPeriod::new(a.min(b), a.max(b)));
            let mut reversed = subs.clone();
            reversed.reverse();
            let mut rotated = subs.clone();
            if !rotated.is_empty() {
                rotated.rotate_left(subs.len() / 2);
            }
            let total = agg.total(&subs);
            prop_assert_eq!(total, agg.total(&reversed));
            prop_assert_eq!(total, agg.total(&rotated));
        }

        #[test]
        fn prop_disjoint_contributes_zero(
            sub in subscription_strategy(),
            a in month_strategy(),
            b in month_strategy(),
        ) {
            let q = QueryPeriod::new(a.min(b), a.max(b));
            let disjoint = sub.start_period > q.end
                || sub.end_period.is_some_and(|end| end < q.start);
            prop_assume!(disjoint);
            prop_assert_eq!(PeriodAggregator::new(q).contribution(&sub), 0);
        }

        #[test]
        fn prop_open_ended_bills_whole_window(
            price in 0u32..10_000,
            a in month_strategy(),
            b in month_strategy(),
            lead in 0i64..24,
        ) {
            let q = QueryPeriod::new(a.min(b), a.max(b));
            let ordinal = i64::from(q.start.year()) * 12 + i64::from(q.start.month()) - 1 - lead;
            let start = CalendarMonth::new((ordinal / 12) as i32, (ordinal % 12) as u32 + 1).unwrap();
            let sub = Subscription::new("svc", price, Uuid::nil(), start);

            let expected = u64::from(price) * (q.start.months_until(&q.end) as u64 + 1);
            prop_assert_eq!(PeriodAggregator::new(q).contribution(&sub), expected);
        }
    }
}
