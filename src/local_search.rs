use serde::Deserialize;

use crate::cost::Cost;
use crate::solver::SolverState;
use crate::swap::{self, PredictStrategy, SwapIter, SwapResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalSearchParams {
    /// Perform an improving move as soon as one is seen instead of
    /// evaluating the whole neighbourhood for the best one.
    pub steepest: bool,
}

impl Default for LocalSearchParams {
    fn default() -> Self {
        LocalSearchParams { steepest: true }
    }
}

/// Descends to a local minimum: repeatedly scans the swap neighbourhood
/// and applies the best (or first, with `steepest`) improving feasible
/// move until none exists.
pub fn local_search(state: &mut SolverState, params: &LocalSearchParams) {
    log::debug!("ls.steepest = {}", params.steepest);

    loop {
        if state.timed_out() {
            break;
        }

        let mut best_move = None;
        let mut best_delta = Cost::MAX;
        let mut result = SwapResult::default();

        for mv in SwapIter::new(&state.current) {
            swap::predict(
                &state.current,
                &mv,
                PredictStrategy::Always,
                PredictStrategy::IfFeasible,
                &mut result,
            );
            if result.feasible && result.delta.total() < best_delta {
                best_delta = result.delta.total();
                best_move = Some(mv);
                if best_delta < 0 && params.steepest {
                    break;
                }
            }
        }

        match best_move {
            Some(mv) if best_delta < 0 => {
                swap::perform(&mut state.current, &mv);
                state.current_cost += best_delta;
                state.report_move_applied();
            }
            _ => break, // local minimum
        }
    }
}
