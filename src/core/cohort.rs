use super::types::ChurnRounding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortStep {
    pub new_clients: u64,
    pub churned_clients: u64,
    pub active_clients: u64,
}

/// Clients lost at the start of a month. The first month has no prior base
/// and never churns; churn can never exceed the clients that existed.
pub fn churned_clients(
    previous_active: u64,
    churn_rate: f64,
    month: usize,
    rounding: ChurnRounding,
) -> u64 {
    if month == 0 || previous_active == 0 || churn_rate <= 0.0 {
        return 0;
    }

    let expected = previous_active as f64 * churn_rate / 100.0;
    let rounded = match rounding {
        ChurnRounding::Floor => expected.floor(),
        ChurnRounding::Round => expected.round(),
    };
    (rounded.max(0.0) as u64).min(previous_active)
}

pub fn advance_cohort(
    previous_active: u64,
    new_clients: u64,
    churn_rate: f64,
    month: usize,
    rounding: ChurnRounding,
) -> CohortStep {
    let churned = churned_clients(previous_active, churn_rate, month, rounding);
    let active = previous_active
        .saturating_add(new_clients)
        .saturating_sub(churned);
    CohortStep {
        new_clients,
        churned_clients: churned,
        active_clients: active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    #[test]
    fn first_month_never_churns() {
        assert_eq!(churned_clients(100, 50.0, 0, ChurnRounding::Floor), 0);
    }

    #[test]
    fn floor_policy_truncates_fractional_churn() {
        assert_eq!(churned_clients(100, 2.0, 1, ChurnRounding::Floor), 2);
        assert_eq!(churned_clients(49, 3.0, 1, ChurnRounding::Floor), 1);
        assert_eq!(churned_clients(10, 5.0, 1, ChurnRounding::Floor), 0);
    }

    #[test]
    fn round_policy_rounds_half_up() {
        assert_eq!(churned_clients(49, 3.0, 1, ChurnRounding::Round), 1);
        assert_eq!(churned_clients(10, 5.0, 1, ChurnRounding::Round), 1);
        assert_eq!(churned_clients(10, 4.0, 1, ChurnRounding::Round), 0);
    }

    #[test]
    fn churn_is_capped_at_previous_base() {
        assert_eq!(churned_clients(10, 250.0, 3, ChurnRounding::Round), 10);
    }

    #[test]
    fn advance_cohort_adds_inflow_and_subtracts_churn() {
        let step = advance_cohort(100, 7, 2.0, 1, ChurnRounding::Floor);
        assert_eq!(step.churned_clients, 2);
        assert_eq!(step.active_clients, 105);
        assert_eq!(step.new_clients, 7);
    }

    #[test]
    fn advance_cohort_saturates_instead_of_overflowing() {
        let step = advance_cohort(u64::MAX - 1, 5, 0.0, 1, ChurnRounding::Floor);
        assert_eq!(step.active_clients, u64::MAX);
        assert_eq!(step.churned_clients, 0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_active_balance_is_conserved(
            previous in 0u64..1_000_000,
            new_clients in 0u64..10_000,
            churn_bp in 0u32..20_000,
            month in 0usize..12,
            round in proptest::bool::ANY,
        ) {
            let rounding = if round { ChurnRounding::Round } else { ChurnRounding::Floor };
            let step = advance_cohort(previous, new_clients, churn_bp as f64 / 100.0, month, rounding);
            prop_assert!(step.churned_clients <= previous);
            prop_assert_eq!(step.active_clients + step.churned_clients, previous + new_clients);
        }
    }
}
