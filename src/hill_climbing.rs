use serde::Deserialize;

use crate::solver::SolverState;
use crate::swap::{self, PredictStrategy, SwapResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HillClimbingParams {
    /// Stop after this many consecutive non-improving iterations.
    pub max_idle: u64,
}

impl Default for HillClimbingParams {
    fn default() -> Self {
        HillClimbingParams { max_idle: 120_000 }
    }
}

/// Random walk over feasible moves, accepting every sideways or improving
/// one. The sampler re-draws until the move is feasible, so only the cost
/// delta is predicted here.
pub fn hill_climbing(state: &mut SolverState, params: &HillClimbingParams) {
    log::debug!("hc.max_idle = {}", params.max_idle);

    let mut idle: u64 = 0;
    let mut result = SwapResult::default();

    while idle < params.max_idle {
        if state.timed_out() {
            break;
        }

        let prev_cost = state.current_cost;
        let mv = swap::generate_random(&state.current, &mut *state.rng, true);
        swap::predict(
            &state.current,
            &mv,
            PredictStrategy::Never,
            PredictStrategy::Always,
            &mut result,
        );

        let delta = result.delta.total();
        if delta <= 0 {
            swap::perform(&mut state.current, &mv);
            state.current_cost += delta;
            state.report_move_applied();
        }

        if state.current_cost < prev_cost {
            idle = 0;
        } else {
            idle += 1;
        }
    }
}
