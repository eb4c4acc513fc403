//! Feasible-solution construction: rank lectures by how hard their course
//! is to place (with a configurable random perturbation), then greedily
//! assign each one to the first room-period that breaks no hard constraint,
//! retrying from scratch on dead ends.

use std::time::Instant;

use bit_set::BitSet;
use serde::Deserialize;

use crate::model::{LectureId, Model, RoomId};
use crate::random::RandomSource;
use crate::solution::{Assignment, Solution};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinderConfig {
    /// Standard deviation of the N(1, sigma) factor applied to each
    /// lecture's difficulty score. Zero makes the ordering deterministic.
    pub ranking_randomness: f64,
}

impl Default for FinderConfig {
    fn default() -> Self {
        FinderConfig {
            ranking_randomness: 0.33,
        }
    }
}

struct RankedLecture {
    lecture: LectureId,
    score: f64,
}

/// Scratch buffers are allocated once here and reused across attempts and
/// multistart cycles.
pub struct FeasibleSolutionFinder<'m> {
    model: &'m Model,
    config: FinderConfig,
    ranked: Vec<RankedLecture>,
    room_busy: BitSet,
    teacher_busy: BitSet,
    curriculum_busy: BitSet,
}

impl<'m> FeasibleSolutionFinder<'m> {
    pub fn new(model: &'m Model, config: FinderConfig) -> Self {
        let periods = model.n_periods();
        FeasibleSolutionFinder {
            model,
            config,
            ranked: Vec::with_capacity(model.n_lectures()),
            room_busy: BitSet::with_capacity(model.n_rooms() * periods),
            teacher_busy: BitSet::with_capacity(model.n_teachers() * periods),
            curriculum_busy: BitSet::with_capacity(model.n_curricula() * periods),
        }
    }

    /// One randomized greedy pass; false if some lecture found no slot.
    fn try_find(&mut self, sol: &mut Solution<'m>, rng: &mut RandomSource) -> bool {
        let model = self.model;
        sol.clear();
        self.room_busy.clear();
        self.teacher_busy.clear();
        self.curriculum_busy.clear();

        self.ranked.clear();
        for l in 0..model.n_lectures() {
            let lecture = LectureId::from_index(l);
            let difficulty = model.difficulty(model.lecture(lecture).course) as f64;
            self.ranked.push(RankedLecture {
                lecture,
                score: difficulty * rng.normal(1.0, self.config.ranking_randomness),
            });
        }
        self.ranked
            .sort_unstable_by(|a, b| b.score.total_cmp(&a.score));

        let periods = model.n_periods();
        let mut n_attempts = 0usize;

        for ranked in &self.ranked {
            let lecture = ranked.lecture;
            let course_id = model.lecture(lecture).course;
            let teacher = model.course(course_id).teacher;
            let curricula = model.curricula_of_course(course_id);

            let mut assigned = false;
            'search: for r in 0..model.n_rooms() {
                for day in 0..model.n_days() {
                    for slot in 0..model.n_slots() {
                        n_attempts += 1;
                        let period = day * model.n_slots() + slot;

                        if self.room_busy.contains(r * periods + period) {
                            continue;
                        }
                        if self.teacher_busy.contains(teacher.raw_index() * periods + period) {
                            continue;
                        }
                        if curricula
                            .iter()
                            .any(|q| self.curriculum_busy.contains(q.raw_index() * periods + period))
                        {
                            continue;
                        }
                        if !model.available(course_id, day, slot) {
                            continue;
                        }

                        self.room_busy.insert(r * periods + period);
                        self.teacher_busy.insert(teacher.raw_index() * periods + period);
                        for q in curricula {
                            self.curriculum_busy.insert(q.raw_index() * periods + period);
                        }
                        sol.assign_lecture(
                            lecture,
                            Assignment {
                                room: RoomId::from_index(r),
                                day,
                                slot,
                            },
                        );
                        assigned = true;
                        break 'search;
                    }
                }
            }

            if !assigned {
                log::debug!(
                    "no feasible slot for a lecture of '{}' ({}/{} assigned, {} attempts)",
                    model.course(course_id).id,
                    sol.assigned_count(),
                    model.n_lectures(),
                    n_attempts
                );
                return false;
            }
        }

        true
    }

    /// Retries randomized passes until one succeeds or the deadline fires.
    /// Returns false only on cancellation; the partial state is cleared.
    pub fn find(
        &mut self,
        sol: &mut Solution<'m>,
        rng: &mut RandomSource,
        deadline: Option<Instant>,
    ) -> bool {
        let mut n_trials = 0usize;
        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                log::info!("finder timed out after {n_trials} trials");
                sol.clear();
                return false;
            }
            n_trials += 1;
            if self.try_find(sol, rng) {
                log::debug!("feasible solution found after {n_trials} trials");
                debug_assert!(sol.satisfies_hard());
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance;
    use std::time::Duration;

    const SNUG: &str = "\
Name: Snug
Courses: 4
Rooms: 2
Days: 2
Periods_per_day: 2
Curricula: 2
Constraints: 2

COURSES:
cA tX 2 2 30
cB tX 2 2 25
cC tY 2 1 15
cD tY 1 1 10

ROOMS:
rA 30
rB 20

CURRICULA:
q0 2 cA cC
q1 2 cB cD

UNAVAILABILITY_CONSTRAINTS:
cA 0 0
cD 1 1
";

    #[test]
    fn finds_a_feasible_solution() {
        let model = instance::try_from_str("snug.ctt", SNUG).unwrap();
        let mut sol = Solution::new(&model);
        let mut rng = RandomSource::with_seed(3);
        let mut finder = FeasibleSolutionFinder::new(&model, FinderConfig::default());

        assert!(finder.find(&mut sol, &mut rng, None));
        assert!(sol.is_complete());
        assert!(sol.satisfies_hard());
        sol.assert_consistency();
    }

    #[test]
    fn zero_randomness_is_deterministic() {
        let model = instance::try_from_str("snug.ctt", SNUG).unwrap();
        let config = FinderConfig {
            ranking_randomness: 0.0,
        };

        let mut first = Solution::new(&model);
        let mut rng = RandomSource::with_seed(1);
        assert!(FeasibleSolutionFinder::new(&model, config.clone()).find(&mut first, &mut rng, None));

        let mut second = Solution::new(&model);
        let mut rng = RandomSource::with_seed(99);
        assert!(FeasibleSolutionFinder::new(&model, config).find(&mut second, &mut rng, None));

        assert_eq!(first, second);
    }

    #[test]
    fn impossible_instance_respects_the_deadline() {
        // Two lectures, one period, one room.
        let text = "\
Name: Impossible
Courses: 1
Rooms: 1
Days: 1
Periods_per_day: 1
Curricula: 0
Constraints: 0

COURSES:
cA tX 2 1 10

ROOMS:
rA 10
";
        let model = instance::try_from_str("impossible.ctt", text).unwrap();
        let mut sol = Solution::new(&model);
        let mut rng = RandomSource::with_seed(5);
        let mut finder = FeasibleSolutionFinder::new(&model, FinderConfig::default());

        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(!finder.find(&mut sol, &mut rng, Some(deadline)));
        assert_eq!(sol.assigned_count(), 0);
    }
}
