use std::collections::BTreeMap;

use super::types::{
    CohortInflow, EnginePolicy, ModelParameters, PayrollScenario, TaxScenario, Tier, TierCatalog,
    UpsellOffer, UpsellPolicy,
};

pub fn tier(id: &str, price: f64, message_quota: f64) -> Tier {
    Tier {
        id: id.to_string(),
        price,
        message_quota,
        integration_price: None,
    }
}

pub fn sample_parameters() -> ModelParameters {
    ModelParameters {
        tax_scenario: TaxScenario::ScenarioA,
        custom_tax_rate: 12.0,
        payroll_scenario: PayrollScenario::ScenarioA,
        payroll_a: vec![20_000.0; 12],
        payroll_b: vec![35_000.0; 12],
        api_cost_pct: 10.0,
        churn_rate: 2.0,
        implementation_cost_cap: 400.0,
        integration_price: 1_000.0,
        cac_pct: 20.0,
        implementation_pct: 30.0,
        partner_commission_rate: 20.0,
        direct_sales_pct: 10.0,
        direct_marketing_pct: 5.0,
        direct_lead_cost: 50.0,
        partner_lead_cost: 20.0,
        usage_rate: 80.0,
        carryover_pct: 100.0,
        overage_price: 0.30,
        direct_channel_pct: 60.0,
        tiers: TierCatalog::new(vec![
            tier("starter", 75.0, 105.0),
            tier("growth", 150.0, 250.0),
            tier("business", 250.0, 500.0),
            tier("scale", 500.0, 1_200.0),
            tier("enterprise", 1_000.0, 3_000.0),
        ]),
        policy: EnginePolicy::default(),
    }
}

/// Parameters with every cost, rate and tax at zero.
pub fn bare_parameters(tiers: Vec<Tier>) -> ModelParameters {
    ModelParameters {
        tax_scenario: TaxScenario::Custom,
        custom_tax_rate: 0.0,
        payroll_scenario: PayrollScenario::ScenarioA,
        payroll_a: vec![0.0; 12],
        payroll_b: vec![0.0; 12],
        api_cost_pct: 0.0,
        churn_rate: 0.0,
        implementation_cost_cap: 0.0,
        integration_price: 0.0,
        cac_pct: 0.0,
        implementation_pct: 0.0,
        partner_commission_rate: 0.0,
        direct_sales_pct: 0.0,
        direct_marketing_pct: 0.0,
        direct_lead_cost: 0.0,
        partner_lead_cost: 0.0,
        usage_rate: 80.0,
        carryover_pct: 100.0,
        overage_price: 0.30,
        direct_channel_pct: 60.0,
        tiers: TierCatalog::new(tiers),
        policy: EnginePolicy::default(),
    }
}

pub fn inflow(series: &[(&str, Vec<i64>)]) -> CohortInflow {
    let per_tier = series
        .iter()
        .map(|(id, counts)| (id.to_string(), counts.clone()))
        .collect::<BTreeMap<_, _>>();
    CohortInflow::new(per_tier)
}

pub fn first_month_only(count: i64) -> Vec<i64> {
    let mut series = vec![0; 12];
    series[0] = count;
    series
}

pub fn sample_inflow() -> CohortInflow {
    inflow(&[
        ("starter", vec![10, 12, 14, 16, 18, 20, 22, 24, 26, 28, 30, 32]),
        ("growth", vec![6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17]),
        ("business", vec![3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8]),
        ("scale", vec![1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4, 5]),
        ("enterprise", vec![0, 1, 0, 1, 1, 1, 1, 2, 1, 2, 2, 2]),
    ])
}

pub fn sample_upsell() -> UpsellPolicy {
    UpsellPolicy {
        automation_units: UpsellOffer { rate: 3.0, price: 49.0 },
        feature_add_ons: UpsellOffer { rate: 2.0, price: 99.0 },
        message_packs: UpsellOffer { rate: 4.0, price: 29.0 },
        extra_integrations: UpsellOffer { rate: 1.0, price: 250.0 },
    }
}
