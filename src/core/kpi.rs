use super::finance::ratio_or_zero;
use super::types::{AggregateRecord, MONTHS, ModelParameters, MonthRecord};

/// Expected client lifetime in months, `1 / churn`, capped so a churn rate
/// near zero cannot blow LTV up.
pub fn expected_lifetime_months(churn_rate: f64, cap_months: f64) -> f64 {
    let cap = cap_months.max(0.0);
    if churn_rate <= 0.0 {
        return cap;
    }
    (100.0 / churn_rate).min(cap)
}

pub fn breakeven_month(months: &[MonthRecord]) -> Option<u32> {
    months
        .iter()
        .find(|record| record.cumulative_profit > 0.0)
        .map(|record| record.month)
}

pub fn aggregate(params: &ModelParameters, months: &[MonthRecord]) -> AggregateRecord {
    let sum = |field: fn(&MonthRecord) -> f64| months.iter().map(field).sum::<f64>();

    let count = |field: fn(&MonthRecord) -> u64| {
        months
            .iter()
            .map(field)
            .fold(0u64, |acc, value| acc.saturating_add(value))
    };

    let total_new_clients = count(|m| m.new_clients);
    let total_churned_clients = count(|m| m.churned_clients);
    let final_active_clients = months.last().map(|m| m.active_clients).unwrap_or(0);

    let total_integration_revenue = sum(|m| m.integration_revenue);
    let total_upsell_revenue = sum(|m| m.upsell_revenue.total);
    let total_revenue = sum(|m| m.total_revenue);
    let total_cac_costs = sum(|m| m.cac_costs);
    let total_implementation_costs = sum(|m| m.implementation_costs);
    let total_expenses = sum(|m| m.total_expenses);
    let total_net_profit = sum(|m| m.net_profit);

    let avg_arpu = ratio_or_zero(total_revenue, final_active_clients as f64) / MONTHS as f64;
    let ltv = avg_arpu
        * expected_lifetime_months(params.churn_rate, params.policy.ltv_cap_months);
    let cac_per_client = ratio_or_zero(total_cac_costs, total_new_clients as f64);

    AggregateRecord {
        total_new_clients,
        final_active_clients,
        total_churned_clients,
        total_integration_revenue,
        total_subscription_revenue: sum(|m| m.subscription_revenue),
        total_overage_revenue: sum(|m| m.overage_revenue),
        total_upsell_revenue,
        total_revenue,
        total_api_costs: sum(|m| m.api_costs),
        total_partner_commission: sum(|m| m.partner_commission),
        total_sales_team_cost: sum(|m| m.sales_team_cost),
        total_marketing_cost: sum(|m| m.marketing_cost),
        total_lead_generation_cost: sum(|m| m.lead_generation_cost),
        total_cac_costs,
        total_implementation_costs,
        total_payroll: sum(|m| m.payroll),
        total_expenses,
        total_gross_profit: sum(|m| m.gross_profit),
        total_tax: sum(|m| m.tax),
        total_net_profit,
        breakeven_month: breakeven_month(months),
        avg_arpu,
        ltv,
        cac_per_client,
        ltv_cac_ratio: ratio_or_zero(ltv, cac_per_client),
        cac_payback_months: ratio_or_zero(cac_per_client, avg_arpu),
        roi: ratio_or_zero(total_net_profit, total_expenses) * 100.0,
        implementation_margin: ratio_or_zero(
            total_integration_revenue - total_implementation_costs,
            total_integration_revenue,
        ) * 100.0,
        expansion_revenue: total_upsell_revenue,
        churned_revenue: sum(|m| m.churned_revenue),
    }
}
