use serde::{Deserialize, Serialize};

use super::types::{CohortInflow, MONTHS, ModelParameters, UpsellPolicy};
use super::run_projection;
use crate::error::{ProjectionError, ProjectionResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalType {
    /// Smallest multiplier on every cohort inflow that breaks even in time.
    #[serde(alias = "inflowScale")]
    InflowScale,
    /// Smallest multiplier on every tier price that breaks even in time.
    #[serde(alias = "priceScale")]
    PriceScale,
    /// Largest multiplier on both payroll series that still breaks even.
    #[serde(alias = "payrollScale")]
    PayrollScale,
}

impl GoalType {
    fn maximizes(self) -> bool {
        matches!(self, GoalType::PayrollScale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveConfig {
    pub goal_type: GoalType,
    /// Latest acceptable breakeven month, 1-based.
    pub target_month: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub breakeven_month: Option<u32>,
    pub net_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub goal_type: GoalType,
    pub target_month: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_value: Option<f64>,
    pub achieved_breakeven_month: Option<u32>,
    pub achieved_net_profit: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    breakeven_month: Option<u32>,
    net_profit: f64,
}

impl CandidateEval {
    fn meets(self, target_month: u32) -> bool {
        self.breakeven_month
            .is_some_and(|month| month <= target_month)
    }
}

pub fn solve_goal(
    params: &ModelParameters,
    inflow: &CohortInflow,
    upsell: &UpsellPolicy,
    config: GoalSolveConfig,
) -> ProjectionResult<GoalSolveResult> {
    validate_config(config)?;

    let evaluate = |value: f64| evaluate_candidate(params, inflow, upsell, config.goal_type, value);
    let low_meets = evaluate(config.search_min).meets(config.target_month);
    let high_meets = evaluate(config.search_max).meets(config.target_month);

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    // Minimising goals need the lower bound to fail and the upper to pass;
    // maximising goals the reverse.
    let (already_at_bound, out_of_reach, bound_value) = if config.goal_type.maximizes() {
        (high_meets, !low_meets, config.search_max)
    } else {
        (low_meets, !high_meets, config.search_min)
    };

    if out_of_reach {
        feasible = false;
        message = "No value within the search bounds reaches breakeven by the target month."
            .to_string();
    } else if already_at_bound {
        solved_value = Some(bound_value);
        converged = true;
        feasible = true;
        message = if config.goal_type.maximizes() {
            "Upper bound still breaks even in time; raise search max for a higher value."
                .to_string()
        } else {
            "Already breaks even in time at the lower bound.".to_string()
        };
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let eval = evaluate(mid);
            log::debug!(
                "solver {:?} iteration={it} candidate={mid:.6} breakeven={:?}",
                config.goal_type,
                eval.breakeven_month
            );
            iterations.push(GoalSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_value: mid,
                breakeven_month: eval.breakeven_month,
                net_profit: eval.net_profit,
            });

            let meets = eval.meets(config.target_month);
            if meets != config.goal_type.maximizes() {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_value = Some(if config.goal_type.maximizes() { lo } else { hi });
        feasible = true;
        message = if converged {
            "Solved breakeven goal.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    let achieved = solved_value.map(evaluate);

    Ok(GoalSolveResult {
        goal_type: config.goal_type,
        target_month: config.target_month,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_value,
        achieved_breakeven_month: achieved.and_then(|eval| eval.breakeven_month),
        achieved_net_profit: achieved.map(|eval| eval.net_profit),
        iterations,
        converged,
        feasible,
        message,
    })
}

fn evaluate_candidate(
    base_params: &ModelParameters,
    base_inflow: &CohortInflow,
    upsell: &UpsellPolicy,
    goal_type: GoalType,
    candidate_value: f64,
) -> CandidateEval {
    let scale = candidate_value.max(0.0);
    let mut params = base_params.clone();
    let mut inflow = base_inflow.clone();

    match goal_type {
        GoalType::InflowScale => {
            for series in inflow.per_tier.values_mut() {
                for count in series.iter_mut() {
                    *count = ((*count).max(0) as f64 * scale).round() as i64;
                }
            }
        }
        GoalType::PriceScale => {
            for tier in params.tiers.tiers.iter_mut() {
                tier.price *= scale;
            }
        }
        GoalType::PayrollScale => {
            for value in params.payroll_a.iter_mut().chain(params.payroll_b.iter_mut()) {
                *value *= scale;
            }
        }
    }

    let projection = run_projection(&params, &inflow, upsell);
    CandidateEval {
        breakeven_month: projection.summary.breakeven_month,
        net_profit: projection.summary.total_net_profit,
    }
}

fn validate_config(config: GoalSolveConfig) -> ProjectionResult<()> {
    let invalid = |msg: &str| Err(ProjectionError::InvalidSolverConfig(msg.to_string()));

    if config.target_month == 0 || config.target_month as usize > MONTHS {
        return invalid("target_month must be between 1 and 12");
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return invalid("search bounds must be finite");
    }
    if config.search_min < 0.0 {
        return invalid("search_min must be >= 0");
    }
    if config.search_max <= config.search_min {
        return invalid("search_max must be greater than search_min");
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return invalid("tolerance must be > 0");
    }
    if config.max_iterations == 0 {
        return invalid("max_iterations must be > 0");
    }
    Ok(())
}
