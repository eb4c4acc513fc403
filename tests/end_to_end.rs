//! End-to-end scenarios over the instances shipped in tests/data/.

use cct_solver::config::Config;
use cct_solver::cost::SoftConstraint;
use cct_solver::finder::{FeasibleSolutionFinder, FinderConfig};
use cct_solver::instance;
use cct_solver::model::Model;
use cct_solver::random::RandomSource;
use cct_solver::solution::Solution;
use cct_solver::solution_io;
use cct_solver::solver::{self, SolverConfig};

const TOY: &str = include_str!("data/toy.ctt");
const TOY_SOL: &str = include_str!("data/toy.sol");
const MIDI: &str = include_str!("data/midi.ctt");
const MIDI_SOL: &str = include_str!("data/midi.sol");

fn toy_model() -> Model {
    instance::try_from_str("toy.ctt", TOY).unwrap()
}

fn midi_model() -> Model {
    instance::try_from_str("midi.ctt", MIDI).unwrap()
}

#[test]
fn toy_reference_solution_is_perfect() {
    let model = toy_model();
    let mut sol = Solution::new(&model);
    solution_io::try_parse_into("toy.sol", TOY_SOL, &mut sol).unwrap();

    assert_eq!(sol.violations_lectures(), 0);
    assert_eq!(sol.violations_room_occupancy(), 0);
    assert_eq!(sol.violations_conflicts(), 0);
    assert_eq!(sol.violations_availabilities(), 0);
    assert_eq!(sol.cost_room_capacity(), 0);
    assert_eq!(sol.cost_min_working_days(), 0);
    assert_eq!(sol.cost_curriculum_compactness(), 0);
    assert_eq!(sol.cost_room_stability(), 0);
    assert_eq!(sol.cost(), 0);
    sol.assert_consistency();
}

#[test]
fn midi_reference_solution_has_the_expected_penalties() {
    let model = midi_model();
    let mut sol = Solution::new(&model);
    solution_io::try_parse_into("midi.sol", MIDI_SOL, &mut sol).unwrap();

    assert!(sol.satisfies_hard());
    let costs = sol.cost_breakdown();
    assert_eq!(costs.get(SoftConstraint::RoomCapacity), 20);
    assert_eq!(costs.get(SoftConstraint::MinWorkingDays), 5);
    assert_eq!(costs.get(SoftConstraint::CurriculumCompactness), 2);
    assert_eq!(costs.get(SoftConstraint::RoomStability), 1);
    assert_eq!(sol.cost(), 28);
}

#[test]
fn finder_produces_a_feasible_toy_solution() {
    let model = toy_model();
    let mut sol = Solution::new(&model);
    let mut rng = RandomSource::with_seed(2024);
    let mut finder = FeasibleSolutionFinder::new(&model, FinderConfig::default());

    assert!(finder.find(&mut sol, &mut rng, None));
    assert!(sol.is_complete());
    assert!(sol.satisfies_hard());
    sol.assert_consistency();
}

fn quick_config(methods: &str) -> Config {
    let mut config = Config::default();
    config.apply_option(&format!("solver.methods={methods}")).unwrap();
    config.apply_option("solver.max_cycles=3").unwrap();
    config.apply_option("hc.max_idle=2000").unwrap();
    config.apply_option("ts.max_idle=40").unwrap();
    config.apply_option("sa.max_idle=2000").unwrap();
    config.apply_option("sa.initial_temperature=1.0").unwrap();
    config.apply_option("sa.min_temperature=0.5").unwrap();
    config.apply_option("sa.cooling_rate=0.8").unwrap();
    config.validate().unwrap();
    config
}

#[test]
fn full_portfolio_solves_the_toy_instance() {
    let model = toy_model();
    let config = quick_config("ls,hc,ts,sa");
    let solver_config = SolverConfig::from_config(&config);
    let mut rng = RandomSource::with_seed(7);

    let mut bests = Vec::new();
    let mut record = |cost| bests.push(cost);
    let outcome = solver::solve(
        &model,
        &solver_config,
        &config.finder,
        &mut rng,
        None,
        Some(&mut record),
    );

    let best = outcome.best.expect("toy must be solvable");
    assert!(best.satisfies_hard());
    assert_eq!(best.cost(), outcome.best_cost);
    assert!(outcome.stats.cycle_count <= 3);
    assert!(outcome.stats.move_count > 0);

    assert!(!bests.is_empty(), "the initial solution must set a best");
    assert!(
        bests.windows(2).all(|pair| pair[1] < pair[0]),
        "best-cost callbacks must be strictly improving: {bests:?}"
    );
    assert_eq!(outcome.best_cost, *bests.last().unwrap());
}

#[test]
fn solver_can_start_from_a_loaded_solution() {
    let model = midi_model();
    let mut starting = Solution::new(&model);
    solution_io::try_parse_into("midi.sol", MIDI_SOL, &mut starting).unwrap();

    let config = quick_config("ls");
    let solver_config = SolverConfig::from_config(&config);
    let mut rng = RandomSource::with_seed(5);

    let outcome = solver::solve(
        &model,
        &solver_config,
        &config.finder,
        &mut rng,
        Some(&starting),
        None,
    );

    assert!(outcome.best_cost <= 28, "local search must not lose ground");
    assert!(outcome.best.unwrap().satisfies_hard());
}

#[test]
fn multistart_regenerates_each_cycle() {
    let model = midi_model();
    let mut config = quick_config("ls");
    config.apply_option("solver.multistart=true").unwrap();
    config.apply_option("solver.max_cycles=2").unwrap();
    let solver_config = SolverConfig::from_config(&config);
    let mut rng = RandomSource::with_seed(11);

    let outcome = solver::solve(&model, &solver_config, &config.finder, &mut rng, None, None);
    assert!(outcome.best.is_some());
    assert_eq!(outcome.stats.cycle_count, 2);
}

#[test]
fn solution_roundtrip_through_the_writer() {
    let model = toy_model();
    let mut sol = Solution::new(&model);
    solution_io::try_parse_into("toy.sol", TOY_SOL, &mut sol).unwrap();

    let text = solution_io::to_string(&sol);
    let mut reread = Solution::new(&model);
    solution_io::try_parse_into("toy.sol", &text, &mut reread).unwrap();
    assert_eq!(sol, reread);
}
