//! The swap neighbourhood used by every metaheuristic: move one assigned
//! lecture to a target room-period, displacing whatever lecture sits there
//! back to the source. Feasibility and the soft-cost delta of a candidate
//! move are predicted in O(1)-class time from the solution's aggregate
//! tables, without mutating anything.

use crate::cost::{Cost, CostCount, SoftConstraint};
use crate::model::{CourseId, LectureId, Model, RoomId};
use crate::random::RandomSource;
use crate::solution::{Assignment, Solution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapMove {
    pub l1: LectureId,
    pub r2: RoomId,
    pub d2: usize,
    pub s2: usize,
}

/// Move endpoints resolved against the current solution state.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSwap {
    pub c1: CourseId,
    pub r1: RoomId,
    pub d1: usize,
    pub s1: usize,
    pub l2: Option<LectureId>,
    pub c2: Option<CourseId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictStrategy {
    Always,
    IfFeasible,
    Never,
}

#[derive(Debug, Default, Clone)]
pub struct SwapResult {
    pub feasible: bool,
    pub delta: CostCount,
}

/// Everything needed to undo a performed swap.
#[derive(Debug, Clone, Copy)]
pub struct AppliedSwap {
    pub mv: SwapMove,
    pub from: Assignment,
    pub l2: Option<LectureId>,
}

pub fn resolve(sol: &Solution, mv: &SwapMove) -> ResolvedSwap {
    let Assignment { room: r1, day: d1, slot: s1 } = sol
        .assignment(mv.l1)
        .expect("swap source lecture is not assigned");
    let l2 = sol.lecture_at(mv.r2, mv.d2, mv.s2);
    ResolvedSwap {
        c1: sol.model().lecture(mv.l1).course,
        r1,
        d1,
        s1,
        l2,
        c2: l2.map(|l| sol.model().lecture(l).course),
    }
}

pub fn is_effective(sol: &Solution, mv: &SwapMove) -> bool {
    let Assignment { room, day, slot } = sol
        .assignment(mv.l1)
        .expect("swap source lecture is not assigned");
    (room, day, slot) != (mv.r2, mv.d2, mv.s2)
}

/// Computes the requested predicates for a candidate move. `result.delta`
/// is only meaningful when the cost strategy asked for it.
pub fn predict(
    sol: &Solution,
    mv: &SwapMove,
    feasibility: PredictStrategy,
    cost: PredictStrategy,
    result: &mut SwapResult,
) {
    let resolved = resolve(sol, mv);

    if feasibility == PredictStrategy::Always {
        result.feasible = check_hard_constraints(sol, mv, &resolved);
    }

    if cost == PredictStrategy::Always
        || (cost == PredictStrategy::IfFeasible && result.feasible)
    {
        compute_delta(sol, mv, &resolved, &mut result.delta);
    }
}

/// H1, H3 and H4 after the swap; H2 cannot break because the move replaces
/// the occupant of the target cell.
fn check_hard_constraints(sol: &Solution, mv: &SwapMove, resolved: &ResolvedSwap) -> bool {
    let model = sol.model();
    let &ResolvedSwap { c1, d1, s1, c2, .. } = resolved;
    let (d2, s2) = (mv.d2, mv.s2);
    let same_period = d1 == d2 && s1 == s2;
    let same_course = c2 == Some(c1);
    let correction = same_period as i32 + same_course as i32;

    // H1: at most one lecture of a course per period.
    if sol.course_load(c1, d2, s2) as i32 - correction > 0 {
        return false;
    }
    if let Some(c2) = c2 {
        if sol.course_load(c2, d1, s1) as i32 - correction > 0 {
            return false;
        }
    }

    // H3: curriculum conflicts.
    for &q in model.curricula_of_course(c1) {
        let shared = c2.is_some_and(|c2| model.share_curriculum(c1, c2, q));
        if sol.curriculum_load(q, d2, s2) as i32 - same_period as i32 - shared as i32 > 0 {
            return false;
        }
    }
    if let Some(c2) = c2 {
        for &q in model.curricula_of_course(c2) {
            let shared = model.share_curriculum(c1, c2, q);
            if sol.curriculum_load(q, d1, s1) as i32 - same_period as i32 - shared as i32 > 0 {
                return false;
            }
        }
    }

    // H3: teacher conflicts.
    let same_teacher = c2.is_some_and(|c2| model.same_teacher(c1, c2));
    let t1 = model.course(c1).teacher;
    if sol.teacher_load(t1, d2, s2) as i32 - same_period as i32 - same_teacher as i32 > 0 {
        return false;
    }
    if let Some(c2) = c2 {
        let t2 = model.course(c2).teacher;
        if sol.teacher_load(t2, d1, s1) as i32 - same_period as i32 - same_teacher as i32 > 0 {
            return false;
        }
    }

    // H4: availabilities.
    if !model.available(c1, d2, s2) {
        return false;
    }
    if let Some(c2) = c2 {
        if !model.available(c2, d1, s1) {
            return false;
        }
    }

    true
}

fn compute_delta(sol: &Solution, mv: &SwapMove, resolved: &ResolvedSwap, delta: &mut CostCount) {
    let model = sol.model();
    let &ResolvedSwap { c1, r1, d1, s1, c2, .. } = resolved;
    let (r2, d2, s2) = (mv.r2, mv.d2, mv.s2);
    delta.clear();

    delta.add(
        SoftConstraint::RoomCapacity,
        room_capacity_delta(model, Some(c1), r1, r2) + room_capacity_delta(model, c2, r2, r1),
    );
    delta.add(
        SoftConstraint::MinWorkingDays,
        min_working_days_delta(sol, Some(c1), d1, d2, c2)
            + min_working_days_delta(sol, c2, d2, d1, Some(c1)),
    );
    delta.add(
        SoftConstraint::CurriculumCompactness,
        compactness_delta(sol, Some(c1), d1, s1, d2, s2, c2)
            + compactness_delta(sol, c2, d2, s2, d1, s1, Some(c1)),
    );
    delta.add(
        SoftConstraint::RoomStability,
        room_stability_delta(sol, Some(c1), r1, r2, c2)
            + room_stability_delta(sol, c2, r2, r1, Some(c1)),
    );
}

fn room_capacity_delta(model: &Model, course: Option<CourseId>, r_from: RoomId, r_to: RoomId) -> Cost {
    let Some(course) = course else { return 0 };
    let students = model.course(course).n_students as Cost;
    let cap_from = model.room(r_from).capacity as Cost;
    let cap_to = model.room(r_to).capacity as Cost;
    ((students - cap_to).max(0) - (students - cap_from).max(0))
        * SoftConstraint::RoomCapacity.weight()
}

fn min_working_days_delta(
    sol: &Solution,
    course: Option<CourseId>,
    d_from: usize,
    d_to: usize,
    other: Option<CourseId>,
) -> Cost {
    let Some(course) = course else { return 0 };
    // Two lectures of one course trading places leave its day spread as-is.
    if other == Some(course) {
        return 0;
    }
    let model = sol.model();
    let min_working_days = model.course(course).min_working_days as Cost;

    let mut days_before: Cost = 0;
    let mut days_after: Cost = 0;
    for day in 0..model.n_days() {
        let load = sol.day_load(course, day) as Cost;
        days_before += load.min(1);
        days_after += (load - (day == d_from) as Cost + (day == d_to) as Cost).min(1);
    }

    ((min_working_days - days_after).max(0) - (min_working_days - days_before).max(0))
        * SoftConstraint::MinWorkingDays.weight()
}

fn room_stability_delta(
    sol: &Solution,
    course: Option<CourseId>,
    r_from: RoomId,
    r_to: RoomId,
    other: Option<CourseId>,
) -> Cost {
    let Some(course) = course else { return 0 };
    if r_from == r_to || other == Some(course) {
        return 0;
    }
    let model = sol.model();

    let mut rooms_before: Cost = 0;
    let mut rooms_after: Cost = 0;
    for r in 0..model.n_rooms() {
        let room = RoomId::from_index(r);
        let usage = sol.room_usage(course, room) as Cost;
        rooms_before += usage.min(1);
        rooms_after += (usage - (room == r_from) as Cost + (room == r_to) as Cost).min(1);
    }

    ((rooms_after - 1).max(0) - (rooms_before - 1).max(0)) * SoftConstraint::RoomStability.weight()
}

// Isolation can only change at the five slots around the vacated and the
// occupied period, so the delta re-evaluates exactly those indicators, with
// the source treated as empty and the target as occupied in the "after"
// state.
fn compactness_delta(
    sol: &Solution,
    course: Option<CourseId>,
    d_from: usize,
    s_from: usize,
    d_to: usize,
    s_to: usize,
    other: Option<CourseId>,
) -> Cost {
    let Some(course) = course else { return 0 };
    if other == Some(course) {
        return 0;
    }
    let model = sol.model();
    let n_slots = model.n_slots() as i64;
    let (s_from, s_to) = (s_from as i64, s_to as i64);

    let mut cost: Cost = 0;
    for &q in model.curricula_of_course(course) {
        // A swap inside one curriculum leaves its period loads untouched.
        if other.is_some_and(|other| model.share_curriculum(other, course, q)) {
            continue;
        }

        // Three staged occupancy views: the original state, the state with
        // the source vacated, and the state with the target occupied too.
        // The out-side delta is evaluated original->vacated and the in-side
        // delta vacated->final, so overlapping slot windows telescope.
        let z = |d: usize, s: i64| {
            s >= 0 && s < n_slots && sol.curriculum_load(q, d, s as usize) > 0
        };
        let z_vacated = |d: usize, s: i64| !(d == d_from && s == s_from) && z(d, s);
        let z_final = |d: usize, s: i64| (d == d_to && s == s_to) || z_vacated(d, s);

        let alone_before = |d: usize, s: i64| z(d, s) && !z(d, s - 1) && !z(d, s + 1);
        let alone_vacated =
            |d: usize, s: i64| z_vacated(d, s) && !z_vacated(d, s - 1) && !z_vacated(d, s + 1);
        let alone_final =
            |d: usize, s: i64| z_final(d, s) && !z_final(d, s - 1) && !z_final(d, s + 1);

        let out_prev =
            alone_vacated(d_from, s_from - 1) as Cost - alone_before(d_from, s_from - 1) as Cost;
        let out_next =
            alone_vacated(d_from, s_from + 1) as Cost - alone_before(d_from, s_from + 1) as Cost;
        let in_prev = alone_final(d_to, s_to - 1) as Cost - alone_vacated(d_to, s_to - 1) as Cost;
        let in_next = alone_final(d_to, s_to + 1) as Cost - alone_vacated(d_to, s_to + 1) as Cost;
        let itself = alone_final(d_to, s_to) as Cost - alone_before(d_from, s_from) as Cost;

        cost += out_prev + out_next + in_prev + in_next + itself;
    }

    cost * SoftConstraint::CurriculumCompactness.weight()
}

/// Applies the move; all solution tables are updated atomically. Returns
/// the record needed to `reverse` it.
pub fn perform(sol: &mut Solution, mv: &SwapMove) -> AppliedSwap {
    let from = sol
        .assignment(mv.l1)
        .expect("swap source lecture is not assigned");
    let l2 = sol.lecture_at(mv.r2, mv.d2, mv.s2);

    sol.unassign_lecture(mv.l1);
    if let Some(l2) = l2 {
        sol.unassign_lecture(l2);
    }
    sol.assign_lecture(
        mv.l1,
        Assignment {
            room: mv.r2,
            day: mv.d2,
            slot: mv.s2,
        },
    );
    if let Some(l2) = l2 {
        sol.assign_lecture(l2, from);
    }

    AppliedSwap { mv: *mv, from, l2 }
}

/// Replays the inverse of a performed swap; afterwards every table is
/// byte-identical to the pre-move state.
pub fn reverse(sol: &mut Solution, applied: &AppliedSwap) {
    sol.unassign_lecture(applied.mv.l1);
    if let Some(l2) = applied.l2 {
        sol.unassign_lecture(l2);
    }
    sol.assign_lecture(applied.mv.l1, applied.from);
    if let Some(l2) = applied.l2 {
        sol.assign_lecture(
            l2,
            Assignment {
                room: applied.mv.r2,
                day: applied.mv.d2,
                slot: applied.mv.s2,
            },
        );
    }
}

/// Uniform random effective move; with `require_feasible` it re-draws until
/// the move also keeps the hard constraints satisfied.
pub fn generate_random(sol: &Solution, rng: &mut RandomSource, require_feasible: bool) -> SwapMove {
    let model = sol.model();
    let mut result = SwapResult::default();
    loop {
        let l1 = LectureId::from_index(rng.usize(0..model.n_lectures()));
        if sol.assignment(l1).is_none() {
            continue;
        }
        let mv = SwapMove {
            l1,
            r2: RoomId::from_index(rng.usize(0..model.n_rooms())),
            d2: rng.usize(0..model.n_days()),
            s2: rng.usize(0..model.n_slots()),
        };
        if !is_effective(sol, &mv) {
            continue;
        }
        if !require_feasible {
            return mv;
        }
        predict(sol, &mv, PredictStrategy::Always, PredictStrategy::Never, &mut result);
        if result.feasible {
            return mv;
        }
    }
}

/// Enumerates every effective move exactly once: assigned lectures in
/// room-major cell order as the source, crossed with every target cell.
/// The order is deterministic for a given solution state.
pub struct SwapIter<'a, 'm> {
    solution: &'a Solution<'m>,
    source_cell: usize,
    source: Option<SourceCell>,
    target_cell: usize,
}

#[derive(Clone, Copy)]
struct SourceCell {
    l1: LectureId,
    cell: usize,
}

impl<'a, 'm> SwapIter<'a, 'm> {
    pub fn new(solution: &'a Solution<'m>) -> Self {
        SwapIter {
            solution,
            source_cell: 0,
            source: None,
            target_cell: 0,
        }
    }

    fn cell_to_rds(&self, cell: usize) -> (RoomId, usize, usize) {
        let model = self.solution.model();
        let slot = cell % model.n_slots();
        let rest = cell / model.n_slots();
        let day = rest % model.n_days();
        let room = RoomId::from_index(rest / model.n_days());
        (room, day, slot)
    }
}

impl Iterator for SwapIter<'_, '_> {
    type Item = SwapMove;

    fn next(&mut self) -> Option<Self::Item> {
        let model = self.solution.model();
        let n_cells = model.n_rooms() * model.n_days() * model.n_slots();

        loop {
            let source = match self.source {
                Some(source) => source,
                None => {
                    while self.source_cell < n_cells {
                        let (room, day, slot) = self.cell_to_rds(self.source_cell);
                        if let Some(l1) = self.solution.lecture_at(room, day, slot) {
                            self.source = Some(SourceCell {
                                l1,
                                cell: self.source_cell,
                            });
                            self.target_cell = 0;
                            break;
                        }
                        self.source_cell += 1;
                    }
                    match self.source {
                        Some(source) => source,
                        None => return None,
                    }
                }
            };

            while self.target_cell < n_cells {
                let target = self.target_cell;
                self.target_cell += 1;
                if target == source.cell {
                    continue;
                }
                let (r2, d2, s2) = self.cell_to_rds(target);
                return Some(SwapMove {
                    l1: source.l1,
                    r2,
                    d2,
                    s2,
                });
            }

            self.source = None;
            self.source_cell += 1;
            self.target_cell = 0;
        }
    }
}
