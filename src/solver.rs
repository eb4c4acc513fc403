//! Round-robin driver: generates a feasible starting solution, then runs
//! the configured metaheuristics in order, cycle after cycle, tracking the
//! best solution found and the per-method statistics.

use std::time::{Duration, Instant};

use itertools::Itertools;
use serde::Deserialize;
use strum::{EnumString, IntoStaticStr};

use crate::config::Config;
use crate::cost::Cost;
use crate::finder::{FeasibleSolutionFinder, FinderConfig};
use crate::hill_climbing::{hill_climbing, HillClimbingParams};
use crate::local_search::{local_search, LocalSearchParams};
use crate::model::Model;
use crate::random::RandomSource;
use crate::simulated_annealing::{simulated_annealing, SimulatedAnnealingParams};
use crate::solution::Solution;
use crate::tabu_search::{tabu_search, TabuSearchParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Ls,
    Hc,
    Ts,
    Sa,
}

/// Method kind plus its parameter bundle; the driver dispatches on this.
#[derive(Debug, Clone)]
pub enum Method {
    LocalSearch(LocalSearchParams),
    HillClimbing(HillClimbingParams),
    TabuSearch(TabuSearchParams),
    SimulatedAnnealing(SimulatedAnnealingParams),
}

impl Method {
    pub fn from_kind(kind: MethodKind, config: &Config) -> Method {
        match kind {
            MethodKind::Ls => Method::LocalSearch(config.ls.clone()),
            MethodKind::Hc => Method::HillClimbing(config.hc.clone()),
            MethodKind::Ts => Method::TabuSearch(config.ts.clone()),
            MethodKind::Sa => Method::SimulatedAnnealing(config.sa.clone()),
        }
    }

    pub fn kind(&self) -> MethodKind {
        match self {
            Method::LocalSearch(_) => MethodKind::Ls,
            Method::HillClimbing(_) => MethodKind::Hc,
            Method::TabuSearch(_) => MethodKind::Ts,
            Method::SimulatedAnnealing(_) => MethodKind::Sa,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().into()
    }

    fn run(&self, state: &mut SolverState) {
        match self {
            Method::LocalSearch(params) => local_search(state, params),
            Method::HillClimbing(params) => hill_climbing(state, params),
            Method::TabuSearch(params) => tabu_search(state, params),
            Method::SimulatedAnnealing(params) => simulated_annealing(state, params),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub methods: Vec<Method>,
    pub max_time: Option<Duration>,
    pub max_cycles: Option<u64>,
    pub multistart: bool,
    pub restore_best_after_cycles: Option<u64>,
}

impl SolverConfig {
    pub fn from_config(config: &Config) -> SolverConfig {
        SolverConfig {
            methods: config
                .solver
                .methods
                .iter()
                .map(|&kind| Method::from_kind(kind, config))
                .collect(),
            max_time: (config.solver.max_time > 0)
                .then(|| Duration::from_secs(config.solver.max_time as u64)),
            max_cycles: (config.solver.max_cycles >= 0).then(|| config.solver.max_cycles as u64),
            multistart: config.solver.multistart,
            restore_best_after_cycles: (config.solver.restore_best_after_cycles > 0)
                .then(|| config.solver.restore_best_after_cycles as u64),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MethodStats {
    pub move_count: u64,
    pub improvement_count: u64,
    pub improvement_delta: i64,
    pub execution_time: Duration,
}

#[derive(Debug)]
pub struct SolverStats {
    pub cycle_count: u64,
    pub move_count: u64,
    pub best_restored_count: u64,
    pub methods: Vec<(&'static str, MethodStats)>,
    pub starting_time: Option<Instant>,
    pub best_solution_time: Option<Instant>,
    pub ending_time: Option<Instant>,
}

impl SolverStats {
    fn new(method_names: impl IntoIterator<Item = &'static str>) -> Self {
        SolverStats {
            cycle_count: 0,
            move_count: 0,
            best_restored_count: 0,
            methods: method_names
                .into_iter()
                .map(|name| (name, MethodStats::default()))
                .collect(),
            starting_time: None,
            best_solution_time: None,
            ending_time: None,
        }
    }
}

/// Shared by the driver and every method: the mutable current solution,
/// the best snapshot, and the bookkeeping around them.
pub struct SolverState<'m, 'a> {
    pub current: Solution<'m>,
    pub current_cost: Cost,
    pub rng: &'a mut RandomSource,

    best: Solution<'m>,
    best_cost: Cost,
    deadline: Option<Instant>,
    cycle: u64,
    method_index: usize,
    non_improving_current_cycles: u64,
    non_improving_best_cycles: u64,
    stats: SolverStats,
    on_new_best: Option<&'a mut dyn FnMut(Cost)>,
}

impl<'m> SolverState<'m, '_> {
    pub fn best(&self) -> &Solution<'m> {
        &self.best
    }

    pub fn best_cost(&self) -> Cost {
        self.best_cost
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn timed_out(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Must be called by methods after every applied move: copies the
    /// current solution into the best slot when it improves on it and
    /// keeps the move statistics. Returns whether a new best was set.
    pub fn report_move_applied(&mut self) -> bool {
        let mut improved = false;

        if self.current_cost < self.best_cost {
            debug_assert!(self.current.satisfies_hard());
            debug_assert_eq!(self.current.cost(), self.current_cost);

            let (method_name, method_stats) = &mut self.stats.methods[self.method_index];
            log::info!(
                "{method_name}: new best solution of cost {}",
                self.current_cost
            );
            if self.best_cost != Cost::MAX {
                method_stats.improvement_count += 1;
                method_stats.improvement_delta += (self.current_cost - self.best_cost) as i64;
            }

            self.best_cost = self.current_cost;
            self.best.clone_from(&self.current);
            self.stats.best_solution_time = Some(Instant::now());
            if let Some(on_new_best) = &mut self.on_new_best {
                on_new_best(self.best_cost);
            }
            improved = true;
        }

        self.stats.move_count += 1;
        self.stats.methods[self.method_index].1.move_count += 1;
        improved
    }
}

pub struct SolverOutcome<'m> {
    pub best: Option<Solution<'m>>,
    pub best_cost: Cost,
    pub stats: SolverStats,
}

fn generate_solution_if_needed<'m>(
    state: &mut SolverState<'m, '_>,
    finder: &mut FeasibleSolutionFinder<'m>,
    starting_solution: Option<&Solution<'m>>,
    multistart: bool,
) -> bool {
    if state.current_cost != Cost::MAX && !multistart {
        return true;
    }

    match starting_solution {
        Some(start) => {
            log::debug!("starting from the loaded solution");
            state.current.clone_from(start);
        }
        None => {
            log::debug!("finding an initial feasible solution");
            let deadline = state.deadline;
            if !finder.find(&mut state.current, &mut *state.rng, deadline) {
                return false;
            }
        }
    }

    state.current_cost = state.current.cost();
    log::debug!("starting from a solution of cost {}", state.current_cost);
    state.report_move_applied();
    true
}

pub fn solve<'m, 'a>(
    model: &'m Model,
    config: &SolverConfig,
    finder_config: &FinderConfig,
    rng: &'a mut RandomSource,
    starting_solution: Option<&Solution<'m>>,
    on_new_best: Option<&'a mut dyn FnMut(Cost)>,
) -> SolverOutcome<'m> {
    assert!(!config.methods.is_empty(), "no methods configured");

    log::info!(
        "solver.methods = {}",
        config.methods.iter().map(Method::name).join(", ")
    );
    log::debug!("solver.max_time = {:?}", config.max_time);
    log::debug!("solver.max_cycles = {:?}", config.max_cycles);
    log::debug!("solver.multistart = {}", config.multistart);
    log::debug!(
        "solver.restore_best_after_cycles = {:?}",
        config.restore_best_after_cycles
    );

    let started = Instant::now();
    let mut finder = FeasibleSolutionFinder::new(model, finder_config.clone());
    let mut state = SolverState {
        current: Solution::new(model),
        current_cost: Cost::MAX,
        rng,
        best: Solution::new(model),
        best_cost: Cost::MAX,
        deadline: config.max_time.map(|limit| started + limit),
        cycle: 0,
        method_index: 0,
        non_improving_current_cycles: 0,
        non_improving_best_cycles: 0,
        stats: SolverStats::new(config.methods.iter().map(Method::name)),
        on_new_best,
    };
    state.stats.starting_time = Some(started);

    let mut last_cycle_log = started;

    while state.best_cost > 0 {
        if state.timed_out() {
            log::info!("time limit reached, stopping");
            break;
        }
        if config.max_cycles.is_some_and(|limit| state.cycle >= limit) {
            log::info!("cycle limit reached ({}), stopping", state.cycle);
            break;
        }

        if !generate_solution_if_needed(
            &mut state,
            &mut finder,
            starting_solution,
            config.multistart,
        ) {
            break;
        }

        if let Some(after) = config.restore_best_after_cycles {
            if !config.multistart && state.non_improving_best_cycles >= after {
                log::info!(
                    "restoring best solution of cost {} after {} cycles without improving it",
                    state.best_cost,
                    state.non_improving_best_cycles
                );
                state.current.clone_from(&state.best);
                state.current_cost = state.best_cost;
                state.non_improving_best_cycles = 0;
                state.non_improving_current_cycles = 0;
                state.stats.best_restored_count += 1;
            }
        }

        let cycle_begin_best_cost = state.best_cost;
        let cycle_begin_current_cost = state.current_cost;

        let now = Instant::now();
        if now.duration_since(last_cycle_log) >= Duration::from_secs(1) {
            last_cycle_log = now;
            let elapsed = now.duration_since(started).as_secs_f64();
            log::info!(
                "cycle {} | current = {} | best = {} | stale for {} cycles | {:.1} moves/s",
                state.cycle,
                state.current_cost,
                state.best_cost,
                state.non_improving_best_cycles,
                state.stats.move_count as f64 / elapsed,
            );
        }

        for (index, method) in config.methods.iter().enumerate() {
            if state.timed_out() {
                break;
            }
            state.method_index = index;
            log::debug!("------ {} begin (cost {})", method.name(), state.current_cost);
            let method_started = Instant::now();
            method.run(&mut state);
            state.stats.methods[index].1.execution_time += method_started.elapsed();
            log::debug!("------ {} end (cost {})", method.name(), state.current_cost);
        }

        state.non_improving_current_cycles = if state.current_cost < cycle_begin_current_cost {
            0
        } else {
            state.non_improving_current_cycles + 1
        };
        state.non_improving_best_cycles = if state.best_cost < cycle_begin_best_cost {
            0
        } else {
            state.non_improving_best_cycles + 1
        };

        state.cycle += 1;
        state.stats.cycle_count += 1;
    }

    let ended = Instant::now();
    state.stats.ending_time = Some(ended);

    let elapsed = ended.duration_since(started).as_secs_f64().max(f64::EPSILON);
    log::info!(
        "solver finished: best = {} | {} cycles | {} moves ({:.1} moves/s) | best restored {} times",
        if state.best_cost == Cost::MAX {
            "none".to_string()
        } else {
            state.best_cost.to_string()
        },
        state.stats.cycle_count,
        state.stats.move_count,
        state.stats.move_count as f64 / elapsed,
        state.stats.best_restored_count,
    );
    for (name, method_stats) in &state.stats.methods {
        log::info!(
            "{name}: {} moves in {:.2}s | improved the best {} times (delta {})",
            method_stats.move_count,
            method_stats.execution_time.as_secs_f64(),
            method_stats.improvement_count,
            method_stats.improvement_delta,
        );
    }

    let SolverState {
        best,
        best_cost,
        stats,
        ..
    } = state;
    SolverOutcome {
        best: (best_cost != Cost::MAX).then_some(best),
        best_cost,
        stats,
    }
}
