mod channel;
mod cohort;
mod engine;
mod finance;
mod kpi;
mod quota;
mod solver;
mod types;

#[cfg(test)]
mod fixtures;

pub use channel::{ChannelSplit, split_clients};
pub use engine::run_projection;
pub use quota::CarryoverLedger;
pub use solver::{GoalSolveConfig, GoalSolveIteration, GoalSolveResult, GoalType, solve_goal};
pub use types::{
    AggregateRecord, CacMethod, ChurnRounding, CohortInflow, EnginePolicy, MONTHS, ModelParameters,
    MonthRecord, PayrollScenario, Projection, SCENARIO_A_TAX_RATE, SCENARIO_B_TAX_RATE, TaxBase,
    TaxScenario, Tier, TierCatalog, TierMonthResult, UpsellCategory, UpsellOffer, UpsellPolicy,
    UpsellRevenue,
};
