use super::channel::{ChannelRevenue, ChannelSplit};
use super::types::{ModelParameters, TaxBase, UpsellCategory, UpsellPolicy, UpsellRevenue};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CacBreakdown {
    pub partner_commission: f64,
    pub sales_team_cost: f64,
    pub marketing_cost: f64,
    pub lead_generation_cost: f64,
}

impl CacBreakdown {
    pub fn total(self) -> f64 {
        self.partner_commission + self.sales_team_cost + self.marketing_cost + self.lead_generation_cost
    }
}

/// `numerator / denominator`, or 0 when the denominator is zero or the
/// result is not finite.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() { value } else { 0.0 }
}

pub fn upsell_revenue(total_active: u64, policy: &UpsellPolicy) -> UpsellRevenue {
    let mut revenue = UpsellRevenue::default();
    for (category, offer) in policy.offers() {
        let adopters = (total_active as f64 * offer.rate.max(0.0) / 100.0).round();
        let amount = adopters * offer.price;
        match category {
            UpsellCategory::AutomationUnits => revenue.automation_units = amount,
            UpsellCategory::FeatureAddOns => revenue.feature_add_ons = amount,
            UpsellCategory::MessagePacks => revenue.message_packs = amount,
            UpsellCategory::ExtraIntegrations => revenue.extra_integrations = amount,
        }
        revenue.total += amount;
    }
    revenue
}

pub fn api_costs(subscription_revenue: f64, overage_revenue: f64, api_cost_pct: f64) -> f64 {
    (subscription_revenue + overage_revenue) * api_cost_pct / 100.0
}

pub fn implementation_cost_per_client(
    integration_price: f64,
    implementation_pct: f64,
    implementation_cost_cap: f64,
) -> f64 {
    (integration_price * implementation_pct / 100.0)
        .min(implementation_cost_cap)
        .max(0.0)
}

pub fn channel_cac(
    params: &ModelParameters,
    revenue: ChannelRevenue,
    new_clients: ChannelSplit,
) -> CacBreakdown {
    CacBreakdown {
        partner_commission: revenue.partner * params.partner_commission_rate / 100.0,
        sales_team_cost: revenue.direct * params.direct_sales_pct / 100.0,
        marketing_cost: revenue.direct * params.direct_marketing_pct / 100.0,
        lead_generation_cost: new_clients.direct as f64 * params.direct_lead_cost
            + new_clients.partner as f64 * params.partner_lead_cost,
    }
}

pub fn flat_rate_cac(new_client_revenue: f64, cac_pct: f64) -> f64 {
    (new_client_revenue * cac_pct / 100.0).max(0.0)
}

/// Splits payroll into development and sales shares for reporting.
pub fn split_payroll(payroll: f64, development_share: f64) -> (f64, f64) {
    let share = development_share.clamp(0.0, 100.0) / 100.0;
    let development = payroll * share;
    (development, payroll - development)
}

pub fn tax_for_month(total_revenue: f64, gross_profit: f64, rate: f64, base: TaxBase) -> f64 {
    let taxable = match base {
        TaxBase::Revenue => total_revenue,
        TaxBase::Profit => gross_profit,
    };
    (taxable.max(0.0) * rate / 100.0).max(0.0)
}

/// Month-over-month recurring revenue retention including expansion. The
/// first month has no baseline and reports 0.
pub fn net_revenue_retention(
    month: usize,
    subscription_revenue: f64,
    expansion_revenue: f64,
    previous_subscription_revenue: f64,
) -> f64 {
    if month == 0 {
        return 0.0;
    }
    ratio_or_zero(
        subscription_revenue + expansion_revenue,
        previous_subscription_revenue,
    ) * 100.0
}
