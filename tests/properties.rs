//! Property sweeps for the swap neighbourhood and the solution's
//! incremental tables, checked against from-scratch recomputation oracles
//! over seeded move sequences.

use cct_solver::cost::SoftConstraint;
use cct_solver::finder::{FeasibleSolutionFinder, FinderConfig};
use cct_solver::instance;
use cct_solver::model::Model;
use cct_solver::random::RandomSource;
use cct_solver::solution::Solution;
use cct_solver::swap::{self, PredictStrategy, SwapIter, SwapResult};

const MIDI: &str = include_str!("data/midi.ctt");
const TOY: &str = include_str!("data/toy.ctt");

const FAMILIES: [SoftConstraint; 4] = [
    SoftConstraint::RoomCapacity,
    SoftConstraint::MinWorkingDays,
    SoftConstraint::CurriculumCompactness,
    SoftConstraint::RoomStability,
];

fn feasible_solution<'m>(model: &'m Model, seed: u64) -> Solution<'m> {
    let mut sol = Solution::new(model);
    let mut rng = RandomSource::with_seed(seed);
    let mut finder = FeasibleSolutionFinder::new(model, FinderConfig::default());
    assert!(finder.find(&mut sol, &mut rng, None));
    sol
}

/// 8.2 + 8.3 + 8.4: every move of the full neighbourhood, on several
/// starting solutions of both instances.
#[test]
fn every_move_agrees_with_the_recomputation_oracle() {
    for text in [MIDI, TOY] {
        let model = instance::try_from_str("instance.ctt", text).unwrap();
        for seed in [1, 2, 3] {
            let mut sol = feasible_solution(&model, seed);
            let snapshot = sol.clone();
            let cost_before = sol.cost();
            let breakdown_before = sol.cost_breakdown();
            let moves: Vec<_> = SwapIter::new(&sol).collect();
            let mut result = SwapResult::default();

            for mv in moves {
                swap::predict(
                    &sol,
                    &mv,
                    PredictStrategy::Always,
                    PredictStrategy::Always,
                    &mut result,
                );

                let applied = swap::perform(&mut sol, &mv);
                sol.assert_consistency();

                // Feasibility prediction matches the slow oracle in both
                // directions.
                assert_eq!(
                    sol.satisfies_hard(),
                    result.feasible,
                    "feasibility mismatch for {mv:?}"
                );

                if result.feasible {
                    assert_eq!(
                        sol.cost() - cost_before,
                        result.delta.total(),
                        "total delta mismatch for {mv:?}"
                    );
                    let breakdown_after = sol.cost_breakdown();
                    for family in FAMILIES {
                        assert_eq!(
                            breakdown_after.get(family) - breakdown_before.get(family),
                            result.delta.get(family),
                            "{family:?} delta mismatch for {mv:?}"
                        );
                    }
                }

                swap::reverse(&mut sol, &applied);
                assert_eq!(sol, snapshot, "reverse did not restore state for {mv:?}");
            }
        }
    }
}

/// 8.1 + 8.5: a long random walk of feasible moves keeps the incremental
/// cost and every table coherent with from-scratch recomputation.
#[test]
fn random_walks_keep_cost_and_tables_coherent() {
    let model = instance::try_from_str("midi.ctt", MIDI).unwrap();
    let mut rng = RandomSource::with_seed(77);
    let mut sol = feasible_solution(&model, 77);
    let mut running_cost = sol.cost();
    let mut result = SwapResult::default();

    for step in 1..=500 {
        let mv = swap::generate_random(&sol, &mut rng, true);
        swap::predict(
            &sol,
            &mv,
            PredictStrategy::Never,
            PredictStrategy::Always,
            &mut result,
        );
        swap::perform(&mut sol, &mv);
        running_cost += result.delta.total();

        if step % 25 == 0 {
            assert!(sol.satisfies_hard(), "walk left the feasible region");
            assert_eq!(running_cost, sol.cost(), "incremental cost diverged");
            assert_eq!(
                sol.cost(),
                sol.cost_breakdown().total(),
                "breakdown disagrees with the sum"
            );
            sol.assert_consistency();
        }
    }
}

/// Applying a predicted-feasible move never leaves the feasible region
/// (8.4, forward direction, over random samples).
#[test]
fn predicted_feasible_random_moves_preserve_feasibility() {
    let model = instance::try_from_str("toy.ctt", TOY).unwrap();
    let mut rng = RandomSource::with_seed(13);
    let mut sol = feasible_solution(&model, 13);

    for _ in 0..300 {
        let mv = swap::generate_random(&sol, &mut rng, true);
        swap::perform(&mut sol, &mv);
        assert!(sol.satisfies_hard());
    }
}
