use std::collections::VecDeque;

/// Unused message allowance carried between months for one tier.
///
/// The balance is held as monthly vintages, oldest at the front. A vintage
/// survives at most `cap_months` months and the whole balance never exceeds
/// `quota * cap_months`, so a low-usage cohort cannot bank unlimited credit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarryoverLedger {
    vintages: VecDeque<f64>,
}

impl CarryoverLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> f64 {
        self.vintages.iter().sum()
    }

    pub fn vintage_count(&self) -> usize {
        self.vintages.len()
    }

    fn consume_oldest_first(&mut self, mut amount: f64) -> f64 {
        for vintage in self.vintages.iter_mut() {
            if amount <= 0.0 {
                break;
            }
            let take = vintage.min(amount);
            *vintage -= take;
            amount -= take;
        }
        amount.max(0.0)
    }

    fn forfeit_newest_first(&mut self, mut amount: f64) {
        for vintage in self.vintages.iter_mut().rev() {
            if amount <= 0.0 {
                break;
            }
            let take = vintage.min(amount);
            *vintage -= take;
            amount -= take;
        }
    }

    fn retain_share(&mut self, share: f64) {
        for vintage in self.vintages.iter_mut() {
            *vintage = (*vintage * share).max(0.0);
        }
    }

    fn expire(&mut self, cap_months: usize) -> f64 {
        let mut expired = 0.0;
        while self.vintages.len() > cap_months {
            expired += self.vintages.pop_front().unwrap_or(0.0);
        }
        expired
    }

    fn trim_to(&mut self, cap: f64) -> f64 {
        let mut excess = (self.balance() - cap).max(0.0);
        let trimmed = excess;
        for vintage in self.vintages.iter_mut() {
            if excess <= 0.0 {
                break;
            }
            let take = vintage.min(excess);
            *vintage -= take;
            excess -= take;
        }
        trimmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaPolicy {
    /// Percent of available messages consumed; above 100 models overage.
    pub usage_rate: f64,
    pub carryover_pct: f64,
    pub cap_months: u32,
    pub overage_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuotaMonth {
    pub available: f64,
    pub used: f64,
    pub additional: f64,
    pub forfeited: f64,
    pub expired: f64,
    pub carried: f64,
    pub overage_revenue: f64,
}

pub fn track_quota_month(
    ledger: &mut CarryoverLedger,
    policy: &QuotaPolicy,
    active_clients: u64,
    churned_clients: u64,
    quota: f64,
) -> QuotaMonth {
    let usage_share = policy.usage_rate.max(0.0) / 100.0;
    let quota = quota.max(0.0);

    let fresh = active_clients as f64 * quota;
    let available = fresh + ledger.balance();
    let used = available * usage_share;
    let additional = (used - available).max(0.0);

    let fresh_consumed = ledger.consume_oldest_first(used.min(available));
    let fresh_left = (fresh - fresh_consumed).max(0.0);
    ledger.vintages.push_back(fresh_left);

    let forfeited = (churned_clients as f64 * quota * (1.0 - usage_share)).max(0.0);
    ledger.forfeit_newest_first(forfeited);

    ledger.retain_share(policy.carryover_pct.clamp(0.0, 100.0) / 100.0);
    let cap_months = policy.cap_months as usize;
    let mut expired = ledger.expire(cap_months);
    expired += ledger.trim_to(quota * cap_months as f64);

    QuotaMonth {
        available,
        used,
        additional,
        forfeited,
        expired,
        carried: ledger.balance(),
        overage_revenue: additional * policy.overage_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn policy(usage_rate: f64) -> QuotaPolicy {
        QuotaPolicy {
            usage_rate,
            carryover_pct: 100.0,
            cap_months: 3,
            overage_price: 0.30,
        }
    }

    #[test]
    fn single_client_carries_unused_allowance_into_month_two() {
        let mut ledger = CarryoverLedger::new();
        let policy = policy(80.0);

        let first = track_quota_month(&mut ledger, &policy, 1, 0, 105.0);
        assert_approx(first.available, 105.0);
        assert_approx(first.used, 84.0);
        assert_approx(first.additional, 0.0);
        assert_approx(first.carried, 21.0);

        let second = track_quota_month(&mut ledger, &policy, 1, 0, 105.0);
        assert_approx(second.available, 126.0);
        assert_approx(second.used, 100.8);
        assert_approx(second.additional, 0.0);
        assert_approx(second.carried, 25.2);
        assert!(second.carried < 105.0 * 3.0);
    }

    #[test]
    fn usage_above_quota_bills_overage_from_month_one() {
        let mut ledger = CarryoverLedger::new();
        let month = track_quota_month(&mut ledger, &policy(120.0), 1, 0, 105.0);
        assert_approx(month.used, 126.0);
        assert_approx(month.additional, 21.0);
        assert_approx(month.overage_revenue, 6.30);
        assert_approx(month.carried, 0.0);
    }

    #[test]
    fn zero_usage_banks_everything_up_to_the_cap() {
        let mut ledger = CarryoverLedger::new();
        let policy = policy(0.0);
        let mut carried = Vec::new();
        for _ in 0..6 {
            carried.push(track_quota_month(&mut ledger, &policy, 1, 0, 100.0).carried);
        }
        assert_approx(carried[0], 100.0);
        assert_approx(carried[1], 200.0);
        assert_approx(carried[2], 300.0);
        for balance in &carried[3..] {
            assert_approx(*balance, 300.0);
        }
        assert!(ledger.vintage_count() <= 3);
    }

    #[test]
    fn carryover_percentage_is_applied_to_the_balance() {
        let mut ledger = CarryoverLedger::new();
        let mut policy = policy(80.0);
        policy.carryover_pct = 50.0;
        let month = track_quota_month(&mut ledger, &policy, 1, 0, 105.0);
        assert_approx(month.carried, 10.5);
    }

    #[test]
    fn churned_clients_forfeit_their_unused_share() {
        let mut ledger = CarryoverLedger::new();
        let month = track_quota_month(&mut ledger, &policy(80.0), 10, 2, 100.0);
        // 200 unused, 2 churned clients would have left 20 each.
        assert_approx(month.forfeited, 40.0);
        assert_approx(month.carried, 160.0);
    }

    #[test]
    fn overage_usage_forfeits_nothing() {
        let mut ledger = CarryoverLedger::new();
        let month = track_quota_month(&mut ledger, &policy(150.0), 10, 5, 100.0);
        assert_approx(month.forfeited, 0.0);
    }

    #[test]
    fn zero_cap_months_disables_carryover() {
        let mut ledger = CarryoverLedger::new();
        let mut policy = policy(50.0);
        policy.cap_months = 0;
        let month = track_quota_month(&mut ledger, &policy, 4, 0, 100.0);
        assert_approx(month.carried, 0.0);
        assert_approx(month.expired, 200.0);
    }

    #[test]
    fn oldest_vintage_is_consumed_before_fresh_allowance() {
        let mut ledger = CarryoverLedger::new();
        let policy = policy(50.0);
        track_quota_month(&mut ledger, &policy, 1, 0, 100.0);
        // 50 carried; now 150 available and 75 used, all 50 old plus 25 fresh.
        let month = track_quota_month(&mut ledger, &policy, 1, 0, 100.0);
        assert_approx(month.carried, 75.0);
        assert_eq!(ledger.vintage_count(), 2);
        assert_approx(ledger.vintages[0], 0.0);
        assert_approx(ledger.vintages[1], 75.0);
    }

    #[test]
    fn vintages_expire_after_cap_months_even_below_the_cap() {
        let mut ledger = CarryoverLedger::new();
        let mut policy = policy(0.0);
        policy.carryover_pct = 50.0;
        let carried: Vec<f64> = (0..12)
            .map(|_| track_quota_month(&mut ledger, &policy, 1, 0, 100.0).carried)
            .collect();

        assert_approx(carried[0], 50.0);
        assert_approx(carried[1], 75.0);
        assert_approx(carried[2], 87.5);
        // The fourth-oldest vintage (6.25) expires although 300 would fit.
        for balance in &carried[3..] {
            assert_approx(*balance, 87.5);
        }
        assert_eq!(ledger.vintage_count(), 3);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_carryover_never_exceeds_cap(
            quota in 1u32..5_000,
            usage_pct in 0u32..200,
            carry_pct in 0u32..=100,
            cap_months in 0u32..6,
            actives in proptest::collection::vec(0u64..500, 12),
            churn in proptest::collection::vec(0u64..50, 12),
        ) {
            let mut ledger = CarryoverLedger::new();
            let policy = QuotaPolicy {
                usage_rate: usage_pct as f64,
                carryover_pct: carry_pct as f64,
                cap_months,
                overage_price: 0.1,
            };
            let cap = quota as f64 * cap_months as f64;
            for (active, churned) in actives.iter().zip(churn.iter()) {
                let month = track_quota_month(&mut ledger, &policy, *active, *churned, quota as f64);
                prop_assert!(month.carried >= 0.0);
                prop_assert!(month.carried <= cap + 1e-6);
                prop_assert!(month.additional >= 0.0);
                prop_assert!(ledger.vintage_count() <= cap_months as usize);
            }
        }
    }
}
