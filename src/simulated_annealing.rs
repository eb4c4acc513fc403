use serde::Deserialize;

use crate::solver::SolverState;
use crate::swap::{self, PredictStrategy, SwapResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatedAnnealingParams {
    /// Stop after this many consecutive non-improving iterations.
    pub max_idle: u64,
    pub initial_temperature: f64,
    /// Multiplier applied to the temperature after each plateau.
    pub cooling_rate: f64,
    pub min_temperature: f64,
    /// Iterations per temperature = coeff * number of lectures.
    pub temperature_length_coeff: f64,
}

impl Default for SimulatedAnnealingParams {
    fn default() -> Self {
        SimulatedAnnealingParams {
            max_idle: 80_000,
            initial_temperature: 1.5,
            cooling_rate: 0.96,
            min_temperature: 0.08,
            temperature_length_coeff: 1.0,
        }
    }
}

fn acceptance(delta: f64, temperature: f64) -> f64 {
    (-delta / temperature).exp()
}

pub fn simulated_annealing(state: &mut SolverState, params: &SimulatedAnnealingParams) {
    let temperature_length = ((state.current.model().n_lectures() as f64)
        * params.temperature_length_coeff)
        .round() as u64;
    log::debug!("sa.max_idle = {}", params.max_idle);
    log::debug!("sa.initial_temperature = {}", params.initial_temperature);
    log::debug!("sa.cooling_rate = {}", params.cooling_rate);
    log::debug!("sa.min_temperature = {}", params.min_temperature);
    log::debug!(
        "sa.temperature_length_coeff = {} (temperature_length = {temperature_length})",
        params.temperature_length_coeff
    );

    let mut local_best_cost = state.current_cost;
    let mut idle: u64 = 0;
    let mut temperature = params.initial_temperature;
    let mut result = SwapResult::default();

    'cooling: while temperature > params.min_temperature && idle < params.max_idle {
        for _ in 0..temperature_length {
            if state.timed_out() {
                break 'cooling;
            }

            let mv = swap::generate_random(&state.current, &mut *state.rng, true);
            swap::predict(
                &state.current,
                &mv,
                PredictStrategy::Never,
                PredictStrategy::Always,
                &mut result,
            );
            let delta = result.delta.total();

            let accept = state.current_cost + delta < state.best_cost()
                || state.rng.f64() < acceptance(delta as f64, temperature);
            if accept {
                swap::perform(&mut state.current, &mv);
                state.current_cost += delta;
                state.report_move_applied();
            }

            if state.current_cost < local_best_cost {
                local_best_cost = state.current_cost;
                idle = 0;
            } else {
                idle += 1;
            }
        }

        temperature *= params.cooling_rate;
    }
}
