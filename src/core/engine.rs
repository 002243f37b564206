use super::channel::{ChannelRevenue, ChannelSplit, attribute_tier_revenue, split_clients};
use super::cohort::advance_cohort;
use super::finance::{
    CacBreakdown, api_costs, channel_cac, flat_rate_cac, implementation_cost_per_client,
    net_revenue_retention, ratio_or_zero, split_payroll, tax_for_month, upsell_revenue,
};
use super::kpi::aggregate;
use super::quota::{CarryoverLedger, QuotaPolicy, track_quota_month};
use super::types::{
    CacMethod, CohortInflow, MONTHS, ModelParameters, MonthRecord, Projection, TierMonthResult,
    UpsellPolicy,
};

#[derive(Debug)]
struct TierState {
    active_clients: u64,
    carryover: CarryoverLedger,
}

/// Everything carried from one month into the next. Built fresh for every
/// run so nothing leaks between recalculations.
#[derive(Debug)]
struct RunState {
    tiers: Vec<TierState>,
    cumulative_revenue: f64,
    cumulative_expenses: f64,
    cumulative_profit: f64,
    previous_subscription_revenue: f64,
}

impl RunState {
    fn new(params: &ModelParameters) -> Self {
        Self {
            tiers: params
                .tiers
                .iter()
                .map(|_| TierState {
                    active_clients: 0,
                    carryover: CarryoverLedger::new(),
                })
                .collect(),
            cumulative_revenue: 0.0,
            cumulative_expenses: 0.0,
            cumulative_profit: 0.0,
            previous_subscription_revenue: 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct TierTotals {
    new_clients: u64,
    direct_new_clients: u64,
    partner_new_clients: u64,
    active_clients: u64,
    churned_clients: u64,
    integration_revenue: f64,
    subscription_revenue: f64,
    new_client_subscription_revenue: f64,
    implementation_costs: f64,
    additional_messages: f64,
    overage_revenue: f64,
    churned_revenue: f64,
    channel_revenue: ChannelRevenue,
}

pub fn run_projection(
    params: &ModelParameters,
    inflow: &CohortInflow,
    upsell: &UpsellPolicy,
) -> Projection {
    let mut state = RunState::new(params);
    let quota_policy = QuotaPolicy {
        usage_rate: params.usage_rate,
        carryover_pct: params.carryover_pct,
        cap_months: params.policy.carryover_cap_months,
        overage_price: params.overage_price,
    };

    let mut months = Vec::with_capacity(MONTHS);
    for month in 0..MONTHS {
        let record = simulate_month(params, inflow, upsell, &quota_policy, month, &mut state);
        log::debug!(
            "month={} active={} revenue={:.2} expenses={:.2} net={:.2} cumulative={:.2}",
            record.month,
            record.active_clients,
            record.total_revenue,
            record.total_expenses,
            record.net_profit,
            record.cumulative_profit
        );
        months.push(record);
    }

    let summary = aggregate(params, &months);
    log::info!(
        "projection: revenue={:.2} net_profit={:.2} final_active={} breakeven={:?}",
        summary.total_revenue,
        summary.total_net_profit,
        summary.final_active_clients,
        summary.breakeven_month
    );

    Projection { months, summary }
}

fn simulate_month(
    params: &ModelParameters,
    inflow: &CohortInflow,
    upsell: &UpsellPolicy,
    quota_policy: &QuotaPolicy,
    month: usize,
    state: &mut RunState,
) -> MonthRecord {
    let direct_ratio = params.direct_ratio();
    let mut totals = TierTotals::default();
    let mut tiers = Vec::with_capacity(params.tiers.len());

    for (tier, tier_state) in params.tiers.iter().zip(state.tiers.iter_mut()) {
        let new_clients = inflow.new_clients(&tier.id, month);
        let step = advance_cohort(
            tier_state.active_clients,
            new_clients,
            params.churn_rate,
            month,
            params.policy.churn_rounding,
        );
        tier_state.active_clients = step.active_clients;

        let split = split_clients(new_clients, direct_ratio);
        let integration_price = params.integration_price_for(tier);
        let subscription_revenue = step.active_clients as f64 * tier.price;
        let integration_revenue = new_clients as f64 * integration_price;
        let implementation_costs = new_clients as f64
            * implementation_cost_per_client(
                integration_price,
                params.implementation_pct,
                params.implementation_cost_cap,
            );
        let quota = track_quota_month(
            &mut tier_state.carryover,
            quota_policy,
            step.active_clients,
            step.churned_clients,
            tier.message_quota,
        );
        let churned_revenue = step.churned_clients as f64 * tier.price;

        totals.add_tier(
            step.active_clients,
            step.churned_clients,
            split,
            subscription_revenue,
            integration_revenue,
            implementation_costs,
        );
        totals.new_client_subscription_revenue += new_clients as f64 * tier.price;
        totals.additional_messages += quota.additional;
        totals.overage_revenue += quota.overage_revenue;
        totals.churned_revenue += churned_revenue;
        totals.channel_revenue.add(attribute_tier_revenue(
            split,
            step.active_clients,
            tier.price,
            integration_price,
            direct_ratio,
        ));

        tiers.push(TierMonthResult {
            tier_id: tier.id.clone(),
            new_clients,
            direct_new_clients: split.direct,
            partner_new_clients: split.partner,
            active_clients: step.active_clients,
            churned_clients: step.churned_clients,
            subscription_revenue,
            integration_revenue,
            implementation_costs,
            messages_available: quota.available,
            messages_used: quota.used,
            additional_messages: quota.additional,
            carried_messages: quota.carried,
            overage_revenue: quota.overage_revenue,
            churned_revenue,
        });
    }

    let upsell_revenue = upsell_revenue(totals.active_clients, upsell);
    let total_revenue = totals.integration_revenue
        + totals.subscription_revenue
        + totals.overage_revenue
        + upsell_revenue.total;

    let api_costs = api_costs(
        totals.subscription_revenue,
        totals.overage_revenue,
        params.api_cost_pct,
    );
    let (cac, mut cac_costs) = match params.policy.cac_method {
        CacMethod::Channel => {
            let new_clients = ChannelSplit {
                direct: totals.direct_new_clients,
                partner: totals.partner_new_clients,
            };
            let cac = channel_cac(params, totals.channel_revenue, new_clients);
            (cac, cac.total())
        }
        CacMethod::FlatRate => (
            CacBreakdown::default(),
            flat_rate_cac(
                totals.integration_revenue + totals.new_client_subscription_revenue,
                params.cac_pct,
            ),
        ),
    };
    let mut total_expenses = api_costs + cac_costs + totals.implementation_costs;
    if params.policy.include_implementation_in_cac {
        cac_costs += totals.implementation_costs;
    }
    let payroll = params.payroll_for_month(month);
    let (payroll_development, payroll_sales) =
        split_payroll(payroll, params.policy.payroll_development_share);
    total_expenses += payroll;

    let gross_profit = total_revenue - total_expenses;
    let tax = tax_for_month(
        total_revenue,
        gross_profit,
        params.tax_rate(),
        params.policy.tax_base,
    );
    let net_profit = gross_profit - tax;

    state.cumulative_revenue += total_revenue;
    state.cumulative_expenses += total_expenses;
    state.cumulative_profit += net_profit;

    let nrr = net_revenue_retention(
        month,
        totals.subscription_revenue,
        upsell_revenue.total + totals.overage_revenue,
        state.previous_subscription_revenue,
    );
    state.previous_subscription_revenue = totals.subscription_revenue;

    MonthRecord {
        month: month as u32 + 1,
        tiers,
        new_clients: totals.new_clients,
        direct_new_clients: totals.direct_new_clients,
        partner_new_clients: totals.partner_new_clients,
        active_clients: totals.active_clients,
        churned_clients: totals.churned_clients,
        integration_revenue: totals.integration_revenue,
        subscription_revenue: totals.subscription_revenue,
        additional_messages: totals.additional_messages,
        overage_revenue: totals.overage_revenue,
        upsell_revenue,
        total_revenue,
        direct_channel_revenue: totals.channel_revenue.direct,
        partner_channel_revenue: totals.channel_revenue.partner,
        churned_revenue: totals.churned_revenue,
        api_costs,
        partner_commission: cac.partner_commission,
        sales_team_cost: cac.sales_team_cost,
        marketing_cost: cac.marketing_cost,
        lead_generation_cost: cac.lead_generation_cost,
        cac_costs,
        implementation_costs: totals.implementation_costs,
        payroll,
        payroll_development,
        payroll_sales,
        total_expenses,
        gross_profit,
        tax,
        net_profit,
        cumulative_revenue: state.cumulative_revenue,
        cumulative_expenses: state.cumulative_expenses,
        cumulative_profit: state.cumulative_profit,
        nrr,
        arpu: ratio_or_zero(total_revenue, totals.active_clients as f64),
    }
}

impl TierTotals {
    fn add_tier(
        &mut self,
        active_clients: u64,
        churned_clients: u64,
        split: ChannelSplit,
        subscription_revenue: f64,
        integration_revenue: f64,
        implementation_costs: f64,
    ) {
        self.new_clients = self.new_clients.saturating_add(split.total());
        self.direct_new_clients = self.direct_new_clients.saturating_add(split.direct);
        self.partner_new_clients = self.partner_new_clients.saturating_add(split.partner);
        self.active_clients = self.active_clients.saturating_add(active_clients);
        self.churned_clients = self.churned_clients.saturating_add(churned_clients);
        self.subscription_revenue += subscription_revenue;
        self.integration_revenue += integration_revenue;
        self.implementation_costs += implementation_costs;
    }
}
