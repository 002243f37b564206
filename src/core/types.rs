use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MONTHS: usize = 12;

pub const SCENARIO_A_TAX_RATE: f64 = 9.0;
pub const SCENARIO_B_TAX_RATE: f64 = 15.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxScenario {
    #[serde(alias = "scenarioA", alias = "a")]
    ScenarioA,
    #[serde(alias = "scenarioB", alias = "b")]
    ScenarioB,
    Custom,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayrollScenario {
    #[serde(alias = "scenarioA", alias = "a")]
    ScenarioA,
    #[serde(alias = "scenarioB", alias = "b")]
    ScenarioB,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChurnRounding {
    Floor,
    Round,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxBase {
    /// Tax on total revenue, charged in loss-making months too.
    Revenue,
    /// Tax on positive gross profit only.
    #[serde(alias = "grossProfit", alias = "gross-profit")]
    Profit,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacMethod {
    /// Partner commission, direct sales, marketing and lead generation.
    Channel,
    /// A single percentage of the revenue brought in by new clients.
    #[serde(alias = "flatRate")]
    FlatRate,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnginePolicy {
    pub churn_rounding: ChurnRounding,
    pub tax_base: TaxBase,
    pub carryover_cap_months: u32,
    pub include_implementation_in_cac: bool,
    pub cac_method: CacMethod,
    pub ltv_cap_months: f64,
    pub payroll_development_share: f64,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            churn_rounding: ChurnRounding::Floor,
            tax_base: TaxBase::Revenue,
            carryover_cap_months: 3,
            include_implementation_in_cac: false,
            cac_method: CacMethod::Channel,
            ltv_cap_months: 36.0,
            payroll_development_share: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub id: String,
    pub price: f64,
    pub message_quota: f64,
    /// Overrides the global integration price for this tier when set.
    #[serde(default)]
    pub integration_price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierCatalog {
    pub tiers: Vec<Tier>,
}

impl TierCatalog {
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self { tiers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Tier> {
        self.tiers.iter().find(|tier| tier.id == id)
    }
}

/// All percentage fields are expressed in percent (9.0 means 9 %).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    pub tax_scenario: TaxScenario,
    pub custom_tax_rate: f64,
    pub payroll_scenario: PayrollScenario,
    pub payroll_a: Vec<f64>,
    pub payroll_b: Vec<f64>,
    pub api_cost_pct: f64,
    pub churn_rate: f64,
    pub implementation_cost_cap: f64,
    pub integration_price: f64,
    pub cac_pct: f64,
    pub implementation_pct: f64,
    pub partner_commission_rate: f64,
    pub direct_sales_pct: f64,
    pub direct_marketing_pct: f64,
    pub direct_lead_cost: f64,
    pub partner_lead_cost: f64,
    pub usage_rate: f64,
    pub carryover_pct: f64,
    pub overage_price: f64,
    /// Share of clients acquired through the direct channel; the partner
    /// channel takes the rest.
    pub direct_channel_pct: f64,
    pub tiers: TierCatalog,
    pub policy: EnginePolicy,
}

impl ModelParameters {
    pub fn tax_rate(&self) -> f64 {
        match self.tax_scenario {
            TaxScenario::ScenarioA => SCENARIO_A_TAX_RATE,
            TaxScenario::ScenarioB => SCENARIO_B_TAX_RATE,
            TaxScenario::Custom => self.custom_tax_rate,
        }
    }

    pub fn payroll_for_month(&self, month: usize) -> f64 {
        let series = match self.payroll_scenario {
            PayrollScenario::ScenarioA => &self.payroll_a,
            PayrollScenario::ScenarioB => &self.payroll_b,
        };
        series.get(month).copied().unwrap_or(0.0)
    }

    pub fn integration_price_for(&self, tier: &Tier) -> f64 {
        tier.integration_price.unwrap_or(self.integration_price)
    }

    pub fn direct_ratio(&self) -> f64 {
        (self.direct_channel_pct / 100.0).clamp(0.0, 1.0)
    }
}

/// New clients per tier per month, keyed by tier id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CohortInflow {
    pub per_tier: BTreeMap<String, Vec<i64>>,
}

impl CohortInflow {
    pub fn new(per_tier: BTreeMap<String, Vec<i64>>) -> Self {
        Self { per_tier }
    }

    /// Missing tiers or months read as zero, negative counts clamp to zero.
    pub fn new_clients(&self, tier_id: &str, month: usize) -> u64 {
        self.per_tier
            .get(tier_id)
            .and_then(|series| series.get(month))
            .map(|&count| count.max(0) as u64)
            .unwrap_or(0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsellCategory {
    AutomationUnits,
    FeatureAddOns,
    MessagePacks,
    ExtraIntegrations,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsellOffer {
    /// Monthly adoption as a percent of the whole active base.
    pub rate: f64,
    pub price: f64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpsellPolicy {
    pub automation_units: UpsellOffer,
    pub feature_add_ons: UpsellOffer,
    pub message_packs: UpsellOffer,
    pub extra_integrations: UpsellOffer,
}

impl UpsellPolicy {
    pub fn offers(&self) -> [(UpsellCategory, UpsellOffer); 4] {
        [
            (UpsellCategory::AutomationUnits, self.automation_units),
            (UpsellCategory::FeatureAddOns, self.feature_add_ons),
            (UpsellCategory::MessagePacks, self.message_packs),
            (UpsellCategory::ExtraIntegrations, self.extra_integrations),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsellRevenue {
    pub automation_units: f64,
    pub feature_add_ons: f64,
    pub message_packs: f64,
    pub extra_integrations: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierMonthResult {
    pub tier_id: String,
    pub new_clients: u64,
    pub direct_new_clients: u64,
    pub partner_new_clients: u64,
    pub active_clients: u64,
    pub churned_clients: u64,
    pub subscription_revenue: f64,
    pub integration_revenue: f64,
    pub implementation_costs: f64,
    pub messages_available: f64,
    pub messages_used: f64,
    pub additional_messages: f64,
    pub carried_messages: f64,
    pub overage_revenue: f64,
    pub churned_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    pub month: u32,
    pub tiers: Vec<TierMonthResult>,

    pub new_clients: u64,
    pub direct_new_clients: u64,
    pub partner_new_clients: u64,
    pub active_clients: u64,
    pub churned_clients: u64,

    pub integration_revenue: f64,
    pub subscription_revenue: f64,
    pub additional_messages: f64,
    pub overage_revenue: f64,
    pub upsell_revenue: UpsellRevenue,
    pub total_revenue: f64,
    pub direct_channel_revenue: f64,
    pub partner_channel_revenue: f64,
    pub churned_revenue: f64,

    pub api_costs: f64,
    pub partner_commission: f64,
    pub sales_team_cost: f64,
    pub marketing_cost: f64,
    pub lead_generation_cost: f64,
    pub cac_costs: f64,
    pub implementation_costs: f64,
    pub payroll: f64,
    pub payroll_development: f64,
    pub payroll_sales: f64,
    pub total_expenses: f64,

    pub gross_profit: f64,
    pub tax: f64,
    pub net_profit: f64,
    pub cumulative_revenue: f64,
    pub cumulative_expenses: f64,
    pub cumulative_profit: f64,
    pub nrr: f64,
    pub arpu: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub total_new_clients: u64,
    pub final_active_clients: u64,
    pub total_churned_clients: u64,

    pub total_integration_revenue: f64,
    pub total_subscription_revenue: f64,
    pub total_overage_revenue: f64,
    pub total_upsell_revenue: f64,
    pub total_revenue: f64,

    pub total_api_costs: f64,
    pub total_partner_commission: f64,
    pub total_sales_team_cost: f64,
    pub total_marketing_cost: f64,
    pub total_lead_generation_cost: f64,
    pub total_cac_costs: f64,
    pub total_implementation_costs: f64,
    pub total_payroll: f64,
    pub total_expenses: f64,

    pub total_gross_profit: f64,
    pub total_tax: f64,
    pub total_net_profit: f64,
    pub breakeven_month: Option<u32>,

    pub avg_arpu: f64,
    pub ltv: f64,
    pub cac_per_client: f64,
    pub ltv_cac_ratio: f64,
    pub cac_payback_months: f64,
    pub roi: f64,
    pub implementation_margin: f64,
    pub expansion_revenue: f64,
    pub churned_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub months: Vec<MonthRecord>,
    pub summary: AggregateRecord,
}
