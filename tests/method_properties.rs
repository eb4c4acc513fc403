//! Progress and termination properties of the four metaheuristics, driven
//! through the solver so each method runs exactly as in production.

use cct_solver::config::Config;
use cct_solver::cost::Cost;
use cct_solver::instance;
use cct_solver::model::Model;
use cct_solver::random::RandomSource;
use cct_solver::solver::{self, SolverConfig};
use cct_solver::swap::{self, PredictStrategy, SwapIter, SwapResult};

const MIDI: &str = include_str!("data/midi.ctt");

fn midi_model() -> Model {
    instance::try_from_str("midi.ctt", MIDI).unwrap()
}

fn one_cycle_config(method: &str) -> Config {
    let mut config = Config::default();
    config.apply_option(&format!("solver.methods={method}")).unwrap();
    config.apply_option("solver.max_cycles=1").unwrap();
    config.apply_option("hc.max_idle=3000").unwrap();
    config.apply_option("ts.max_idle=60").unwrap();
    config.apply_option("sa.max_idle=3000").unwrap();
    config.apply_option("sa.initial_temperature=1.2").unwrap();
    config.apply_option("sa.min_temperature=0.3").unwrap();
    config.apply_option("sa.cooling_rate=0.7").unwrap();
    config.validate().unwrap();
    config
}

fn run(method: &str, seed: u64, bests: &mut Vec<Cost>) -> (Option<Cost>, Cost) {
    let model = midi_model();
    let config = one_cycle_config(method);
    let solver_config = SolverConfig::from_config(&config);
    let mut rng = RandomSource::with_seed(seed);

    let mut record = |cost| bests.push(cost);
    let outcome = solver::solve(
        &model,
        &solver_config,
        &config.finder,
        &mut rng,
        None,
        Some(&mut record),
    );
    (bests.first().copied(), outcome.best_cost)
}

/// After local search terminates, no feasible move improves the solution.
#[test]
fn local_search_ends_in_a_local_minimum() {
    let model = midi_model();
    let config = one_cycle_config("ls");
    let solver_config = SolverConfig::from_config(&config);
    let mut rng = RandomSource::with_seed(31);

    let outcome = solver::solve(&model, &solver_config, &config.finder, &mut rng, None, None);
    let best = outcome.best.expect("midi is solvable");

    let mut result = SwapResult::default();
    for mv in SwapIter::new(&best) {
        swap::predict(
            &best,
            &mv,
            PredictStrategy::Always,
            PredictStrategy::IfFeasible,
            &mut result,
        );
        assert!(
            !(result.feasible && result.delta.total() < 0),
            "improving feasible move {mv:?} left after local search"
        );
    }
}

/// Hill climbing never ends above the cost it started from.
#[test]
fn hill_climbing_does_not_lose_ground() {
    for seed in [1, 17, 42] {
        let mut bests = Vec::new();
        let (initial, final_best) = run("hc", seed, &mut bests);
        let initial = initial.expect("generation must report the initial best");
        assert!(
            final_best <= initial,
            "hc worsened {initial} -> {final_best} (seed {seed})"
        );
    }
}

/// The global best is monotonically non-increasing during tabu search.
#[test]
fn tabu_search_best_is_monotone() {
    let mut bests = Vec::new();
    run("ts", 23, &mut bests);
    assert!(!bests.is_empty());
    assert!(
        bests.windows(2).all(|pair| pair[1] < pair[0]),
        "best-cost sequence must strictly improve: {bests:?}"
    );
}

/// A well-formed SA configuration terminates on its own.
#[test]
fn simulated_annealing_terminates() {
    let mut bests = Vec::new();
    let (_, final_best) = run("sa", 99, &mut bests);
    assert!(final_best < Cost::MAX);
}
