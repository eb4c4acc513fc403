//! Mutable timetable state: one canonical boolean tensor over
//! (course, room, day, slot) plus the aggregate tables every neighbourhood
//! and cost query needs in O(1). All tables are kept coherent on every
//! mutation; `assert_consistency` recomputes them from the tensor alone.

use std::fmt::Write as _;

use bit_set::BitSet;

use crate::cost::{Cost, CostCount, HardConstraint, SoftConstraint, ViolationCount};
use crate::model::{CourseId, CurriculumId, LectureId, Model, RoomId, TeacherId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub room: RoomId,
    pub day: usize,
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct Solution<'m> {
    model: &'m Model,

    /// Canonical tensor: bit ((c·R + r)·D + d)·S + s is set iff a lecture
    /// of course c sits in room r at period (d, s).
    tt: BitSet,

    course_at: Box<[Option<CourseId>]>,  // by (r, d, s)
    lecture_at: Box<[Option<LectureId>]>, // by (r, d, s)

    sum_cr: Box<[u32]>,  // lectures of c held in r
    sum_cd: Box<[u32]>,  // lectures of c on day d
    sum_cds: Box<[u32]>, // lectures of c at period (d, s)
    sum_rds: Box<[u32]>, // occupancy of room r at (d, s)
    sum_qds: Box<[u32]>, // lectures of curriculum q at (d, s)
    sum_tds: Box<[u32]>, // lectures of teacher t at (d, s)

    /// Authoritative per-lecture assignment.
    assignments: Box<[Option<Assignment>]>,
}

impl<'m> Solution<'m> {
    pub fn new(model: &'m Model) -> Self {
        let (c, r, d, s) = (
            model.n_courses(),
            model.n_rooms(),
            model.n_days(),
            model.n_slots(),
        );
        let (q, t) = (model.n_curricula(), model.n_teachers());
        Solution {
            model,
            tt: BitSet::with_capacity(c * r * d * s),
            course_at: vec![None; r * d * s].into_boxed_slice(),
            lecture_at: vec![None; r * d * s].into_boxed_slice(),
            sum_cr: vec![0; c * r].into_boxed_slice(),
            sum_cd: vec![0; c * d].into_boxed_slice(),
            sum_cds: vec![0; c * d * s].into_boxed_slice(),
            sum_rds: vec![0; r * d * s].into_boxed_slice(),
            sum_qds: vec![0; q * d * s].into_boxed_slice(),
            sum_tds: vec![0; t * d * s].into_boxed_slice(),
            assignments: vec![None; model.n_lectures()].into_boxed_slice(),
        }
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    pub fn clear(&mut self) {
        self.tt.clear();
        self.course_at.fill(None);
        self.lecture_at.fill(None);
        self.sum_cr.fill(0);
        self.sum_cd.fill(0);
        self.sum_cds.fill(0);
        self.sum_rds.fill(0);
        self.sum_qds.fill(0);
        self.sum_tds.fill(0);
        self.assignments.fill(None);
    }

    fn idx_crds(&self, c: CourseId, r: RoomId, day: usize, slot: usize) -> usize {
        ((c.raw_index() * self.model.n_rooms() + r.raw_index()) * self.model.n_days() + day)
            * self.model.n_slots()
            + slot
    }

    fn idx_rds(&self, r: RoomId, day: usize, slot: usize) -> usize {
        (r.raw_index() * self.model.n_days() + day) * self.model.n_slots() + slot
    }

    fn idx_cds(&self, c: CourseId, day: usize, slot: usize) -> usize {
        (c.raw_index() * self.model.n_days() + day) * self.model.n_slots() + slot
    }

    fn idx_qds(&self, q: CurriculumId, day: usize, slot: usize) -> usize {
        (q.raw_index() * self.model.n_days() + day) * self.model.n_slots() + slot
    }

    fn idx_tds(&self, t: TeacherId, day: usize, slot: usize) -> usize {
        (t.raw_index() * self.model.n_days() + day) * self.model.n_slots() + slot
    }

    pub fn scheduled(&self, c: CourseId, r: RoomId, day: usize, slot: usize) -> bool {
        self.tt.contains(self.idx_crds(c, r, day, slot))
    }

    pub fn course_at(&self, r: RoomId, day: usize, slot: usize) -> Option<CourseId> {
        self.course_at[self.idx_rds(r, day, slot)]
    }

    pub fn lecture_at(&self, r: RoomId, day: usize, slot: usize) -> Option<LectureId> {
        self.lecture_at[self.idx_rds(r, day, slot)]
    }

    pub fn assignment(&self, l: LectureId) -> Option<Assignment> {
        self.assignments[l.raw_index()]
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.assignments.iter().all(|a| a.is_some())
    }

    pub fn course_load(&self, c: CourseId, day: usize, slot: usize) -> u32 {
        self.sum_cds[self.idx_cds(c, day, slot)]
    }

    pub fn room_load(&self, r: RoomId, day: usize, slot: usize) -> u32 {
        self.sum_rds[self.idx_rds(r, day, slot)]
    }

    pub fn curriculum_load(&self, q: CurriculumId, day: usize, slot: usize) -> u32 {
        self.sum_qds[self.idx_qds(q, day, slot)]
    }

    pub fn teacher_load(&self, t: TeacherId, day: usize, slot: usize) -> u32 {
        self.sum_tds[self.idx_tds(t, day, slot)]
    }

    pub fn day_load(&self, c: CourseId, day: usize) -> u32 {
        self.sum_cd[c.raw_index() * self.model.n_days() + day]
    }

    pub fn room_usage(&self, c: CourseId, r: RoomId) -> u32 {
        self.sum_cr[c.raw_index() * self.model.n_rooms() + r.raw_index()]
    }

    pub fn assign_lecture(&mut self, l: LectureId, assignment: Assignment) {
        debug_assert!(self.assignments[l.raw_index()].is_none());
        let Assignment { room, day, slot } = assignment;
        let c = self.model.lecture(l).course;
        let t = self.model.course(c).teacher;

        self.tt.insert(self.idx_crds(c, room, day, slot));
        let rds = self.idx_rds(room, day, slot);
        self.course_at[rds] = Some(c);
        self.lecture_at[rds] = Some(l);

        self.sum_cr[c.raw_index() * self.model.n_rooms() + room.raw_index()] += 1;
        self.sum_cd[c.raw_index() * self.model.n_days() + day] += 1;
        self.sum_cds[self.idx_cds(c, day, slot)] += 1;
        self.sum_rds[rds] += 1;
        self.sum_tds[self.idx_tds(t, day, slot)] += 1;
        for &q in self.model.curricula_of_course(c) {
            self.sum_qds[self.idx_qds(q, day, slot)] += 1;
        }

        self.assignments[l.raw_index()] = Some(assignment);
    }

    pub fn unassign_lecture(&mut self, l: LectureId) {
        let Assignment { room, day, slot } = self.assignments[l.raw_index()]
            .expect("unassigning a lecture that is not assigned");
        let c = self.model.lecture(l).course;
        let t = self.model.course(c).teacher;

        self.tt.remove(self.idx_crds(c, room, day, slot));
        let rds = self.idx_rds(room, day, slot);
        self.course_at[rds] = None;
        self.lecture_at[rds] = None;

        self.sum_cr[c.raw_index() * self.model.n_rooms() + room.raw_index()] -= 1;
        self.sum_cd[c.raw_index() * self.model.n_days() + day] -= 1;
        self.sum_cds[self.idx_cds(c, day, slot)] -= 1;
        self.sum_rds[rds] -= 1;
        self.sum_tds[self.idx_tds(t, day, slot)] -= 1;
        for &q in self.model.curricula_of_course(c) {
            self.sum_qds[self.idx_qds(q, day, slot)] -= 1;
        }

        self.assignments[l.raw_index()] = None;
    }

    // ---- hard constraints, recomputed from the tensor ----

    pub fn violations_lectures(&self) -> u32 {
        let model = self.model;
        let mut violations = 0;

        for c in 0..model.n_courses() {
            let course_id = CourseId::from_index(c);
            let mut n = 0usize;
            for r in 0..model.n_rooms() {
                for day in 0..model.n_days() {
                    for slot in 0..model.n_slots() {
                        n += self.scheduled(course_id, RoomId::from_index(r), day, slot) as usize;
                    }
                }
            }
            let expected = model.course(course_id).n_lectures;
            violations += expected.saturating_sub(n) as u32;
        }

        // Two rooms hosting the same course at one period also break H1.
        for c in 0..model.n_courses() {
            let course_id = CourseId::from_index(c);
            for day in 0..model.n_days() {
                for slot in 0..model.n_slots() {
                    let rooms_used = (0..model.n_rooms())
                        .filter(|&r| self.scheduled(course_id, RoomId::from_index(r), day, slot))
                        .count();
                    if rooms_used > 1 {
                        violations += 1;
                    }
                }
            }
        }

        violations
    }

    pub fn violations_room_occupancy(&self) -> u32 {
        let model = self.model;
        let mut violations = 0;
        for r in 0..model.n_rooms() {
            for day in 0..model.n_days() {
                for slot in 0..model.n_slots() {
                    let n = (0..model.n_courses())
                        .filter(|&c| self.scheduled(CourseId::from_index(c), RoomId::from_index(r), day, slot))
                        .count();
                    if n > 1 {
                        violations += 1;
                    }
                }
            }
        }
        violations
    }

    pub fn violations_conflicts(&self) -> u32 {
        let model = self.model;
        let mut violations = 0;

        for q in 0..model.n_curricula() {
            let courses = model.courses_of_curriculum(CurriculumId::from_index(q));
            for day in 0..model.n_days() {
                for slot in 0..model.n_slots() {
                    let n: usize = courses
                        .iter()
                        .map(|&c| {
                            (0..model.n_rooms())
                                .filter(|&r| self.scheduled(c, RoomId::from_index(r), day, slot))
                                .count()
                        })
                        .sum();
                    if n > 1 {
                        violations += 1;
                    }
                }
            }
        }

        for t in 0..model.n_teachers() {
            let courses = model.courses_of_teacher(TeacherId::from_index(t));
            for day in 0..model.n_days() {
                for slot in 0..model.n_slots() {
                    let n: usize = courses
                        .iter()
                        .map(|&c| {
                            (0..model.n_rooms())
                                .filter(|&r| self.scheduled(c, RoomId::from_index(r), day, slot))
                                .count()
                        })
                        .sum();
                    if n > 1 {
                        violations += 1;
                    }
                }
            }
        }

        violations
    }

    pub fn violations_availabilities(&self) -> u32 {
        let model = self.model;
        let mut violations = 0;
        for c in 0..model.n_courses() {
            let course_id = CourseId::from_index(c);
            for day in 0..model.n_days() {
                for slot in 0..model.n_slots() {
                    if model.available(course_id, day, slot) {
                        continue;
                    }
                    let n = (0..model.n_rooms())
                        .filter(|&r| self.scheduled(course_id, RoomId::from_index(r), day, slot))
                        .count();
                    if n > 0 {
                        violations += 1;
                    }
                }
            }
        }
        violations
    }

    pub fn violations(&self) -> ViolationCount {
        let mut violations = ViolationCount::new();
        violations.add(HardConstraint::Lectures, self.violations_lectures());
        violations.add(HardConstraint::RoomOccupancy, self.violations_room_occupancy());
        violations.add(HardConstraint::Conflicts, self.violations_conflicts());
        violations.add(HardConstraint::Availabilities, self.violations_availabilities());
        violations
    }

    pub fn satisfies_hard(&self) -> bool {
        self.violations().is_feasible()
    }

    // ---- soft constraints, recomputed from the tensor ----

    pub fn cost_room_capacity(&self) -> Cost {
        let model = self.model;
        let mut penalty = 0;
        for c in 0..model.n_courses() {
            let course_id = CourseId::from_index(c);
            let students = model.course(course_id).n_students as Cost;
            for r in 0..model.n_rooms() {
                let room_id = RoomId::from_index(r);
                let capacity = model.room(room_id).capacity as Cost;
                for day in 0..model.n_days() {
                    for slot in 0..model.n_slots() {
                        if self.scheduled(course_id, room_id, day, slot) {
                            penalty += (students - capacity).max(0);
                        }
                    }
                }
            }
        }
        penalty * SoftConstraint::RoomCapacity.weight()
    }

    pub fn cost_min_working_days(&self) -> Cost {
        let model = self.model;
        let mut penalty = 0;
        for c in 0..model.n_courses() {
            let course_id = CourseId::from_index(c);
            let days: Cost = (0..model.n_days())
                .map(|day| {
                    let on_day = (0..model.n_rooms()).any(|r| {
                        (0..model.n_slots())
                            .any(|slot| self.scheduled(course_id, RoomId::from_index(r), day, slot))
                    });
                    on_day as Cost
                })
                .sum();
            penalty += (model.course(course_id).min_working_days as Cost - days).max(0);
        }
        penalty * SoftConstraint::MinWorkingDays.weight()
    }

    pub fn cost_curriculum_compactness(&self) -> Cost {
        let model = self.model;
        let mut penalty = 0;
        let mut slots = vec![0u32; model.n_slots()];

        for q in 0..model.n_curricula() {
            let courses = model.courses_of_curriculum(CurriculumId::from_index(q));
            for day in 0..model.n_days() {
                for (slot, load) in slots.iter_mut().enumerate() {
                    *load = courses
                        .iter()
                        .map(|&c| {
                            (0..model.n_rooms())
                                .filter(|&r| self.scheduled(c, RoomId::from_index(r), day, slot))
                                .count() as u32
                        })
                        .sum();
                }

                for slot in 0..model.n_slots() {
                    let prev = slot > 0 && slots[slot - 1] > 0;
                    let next = slot + 1 < model.n_slots() && slots[slot + 1] > 0;
                    if slots[slot] > 0 && !prev && !next {
                        penalty += slots[slot] as Cost;
                    }
                }
            }
        }

        penalty * SoftConstraint::CurriculumCompactness.weight()
    }

    pub fn cost_room_stability(&self) -> Cost {
        let model = self.model;
        let mut penalty = 0;
        for c in 0..model.n_courses() {
            let course_id = CourseId::from_index(c);
            let rooms: Cost = (0..model.n_rooms())
                .map(|r| {
                    let used = (0..model.n_days()).any(|day| {
                        (0..model.n_slots())
                            .any(|slot| self.scheduled(course_id, RoomId::from_index(r), day, slot))
                    });
                    used as Cost
                })
                .sum();
            penalty += (rooms - 1).max(0);
        }
        penalty * SoftConstraint::RoomStability.weight()
    }

    pub fn cost_breakdown(&self) -> CostCount {
        let mut costs = CostCount::new();
        costs.add(SoftConstraint::RoomCapacity, self.cost_room_capacity());
        costs.add(SoftConstraint::MinWorkingDays, self.cost_min_working_days());
        costs.add(
            SoftConstraint::CurriculumCompactness,
            self.cost_curriculum_compactness(),
        );
        costs.add(SoftConstraint::RoomStability, self.cost_room_stability());
        costs
    }

    pub fn cost(&self) -> Cost {
        self.cost_breakdown().total()
    }

    /// Human-readable violation and penalty summary, optionally listing
    /// each offending entity.
    pub fn quality_report(&self, detailed: bool) -> String {
        let model = self.model;
        let mut out = String::new();

        if detailed {
            for c in 0..model.n_courses() {
                let course_id = CourseId::from_index(c);
                let course = model.course(course_id);
                let assigned: usize = (0..model.n_lectures())
                    .filter(|&l| {
                        model.lecture(LectureId::from_index(l)).course == course_id
                            && self.assignment(LectureId::from_index(l)).is_some()
                    })
                    .count();
                if assigned < course.n_lectures {
                    let _ = writeln!(
                        out,
                        "H1 [lectures]: course '{}' has {assigned} of {} lectures scheduled",
                        course.id, course.n_lectures
                    );
                }
                let days: u32 = (0..model.n_days()).map(|d| (self.day_load(course_id, d) > 0) as u32).sum();
                if (days as usize) < course.min_working_days {
                    let _ = writeln!(
                        out,
                        "S2 [min_working_days]: course '{}' is spread over {days} days instead of {}",
                        course.id, course.min_working_days
                    );
                }
                let rooms: u32 = (0..model.n_rooms())
                    .map(|r| (self.room_usage(course_id, RoomId::from_index(r)) > 0) as u32)
                    .sum();
                if rooms > 1 {
                    let _ = writeln!(
                        out,
                        "S4 [room_stability]: course '{}' uses {rooms} distinct rooms",
                        course.id
                    );
                }
            }
            for l in 0..model.n_lectures() {
                let lecture_id = LectureId::from_index(l);
                let Some(assignment) = self.assignment(lecture_id) else {
                    continue;
                };
                let course = model.course(model.lecture(lecture_id).course);
                let room = model.room(assignment.room);
                if course.n_students > room.capacity {
                    let _ = writeln!(
                        out,
                        "S1 [room_capacity]: course '{}' has {} students in room '{}' with {} seats \
                         at (day={}, slot={})",
                        course.id,
                        course.n_students,
                        room.id,
                        room.capacity,
                        assignment.day,
                        assignment.slot
                    );
                }
            }
        }

        let violations = self.violations();
        let costs = self.cost_breakdown();
        let _ = writeln!(out, "violations ({}):", violations.total());
        let _ = write!(out, "{violations}");
        let _ = writeln!(out, "cost ({}):", costs.total());
        let _ = write!(out, "{costs}");
        out
    }

    /// Recomputes every aggregate table from the canonical tensor and the
    /// per-lecture assignments, panicking on the first mismatch.
    pub fn assert_consistency(&self) {
        let model = self.model;
        let mut tt_bits = 0usize;
        let mut assigned = 0usize;

        let mut sum_cr = vec![0u32; self.sum_cr.len()];
        let mut sum_cd = vec![0u32; self.sum_cd.len()];
        let mut sum_cds = vec![0u32; self.sum_cds.len()];
        let mut sum_rds = vec![0u32; self.sum_rds.len()];
        let mut sum_qds = vec![0u32; self.sum_qds.len()];
        let mut sum_tds = vec![0u32; self.sum_tds.len()];

        for c in 0..model.n_courses() {
            let course_id = CourseId::from_index(c);
            let t = model.course(course_id).teacher;
            for r in 0..model.n_rooms() {
                let room_id = RoomId::from_index(r);
                for day in 0..model.n_days() {
                    for slot in 0..model.n_slots() {
                        if !self.scheduled(course_id, room_id, day, slot) {
                            continue;
                        }
                        tt_bits += 1;
                        sum_cr[c * model.n_rooms() + r] += 1;
                        sum_cd[c * model.n_days() + day] += 1;
                        sum_cds[self.idx_cds(course_id, day, slot)] += 1;
                        sum_rds[self.idx_rds(room_id, day, slot)] += 1;
                        sum_tds[self.idx_tds(t, day, slot)] += 1;
                        for &q in model.curricula_of_course(course_id) {
                            sum_qds[self.idx_qds(q, day, slot)] += 1;
                        }
                    }
                }
            }
        }

        assert_eq!(&sum_cr[..], &self.sum_cr[..], "sum_cr diverged from tt");
        assert_eq!(&sum_cd[..], &self.sum_cd[..], "sum_cd diverged from tt");
        assert_eq!(&sum_cds[..], &self.sum_cds[..], "sum_cds diverged from tt");
        assert_eq!(&sum_rds[..], &self.sum_rds[..], "sum_rds diverged from tt");
        assert_eq!(&sum_qds[..], &self.sum_qds[..], "sum_qds diverged from tt");
        assert_eq!(&sum_tds[..], &self.sum_tds[..], "sum_tds diverged from tt");

        for l in 0..model.n_lectures() {
            let lecture_id = LectureId::from_index(l);
            let Some(Assignment { room, day, slot }) = self.assignment(lecture_id) else {
                continue;
            };
            assigned += 1;
            let c = model.lecture(lecture_id).course;
            assert!(
                self.scheduled(c, room, day, slot),
                "lecture {l} assigned to (r={}, d={day}, s={slot}) but tt bit is unset",
                room.raw_index()
            );
            assert_eq!(
                self.lecture_at(room, day, slot),
                Some(lecture_id),
                "lecture_at diverged for lecture {l}"
            );
            assert_eq!(
                self.course_at(room, day, slot),
                Some(c),
                "course_at diverged for lecture {l}"
            );
        }

        assert_eq!(tt_bits, assigned, "tt holds bits with no backing assignment");

        for r in 0..model.n_rooms() {
            let room_id = RoomId::from_index(r);
            for day in 0..model.n_days() {
                for slot in 0..model.n_slots() {
                    if self.room_load(room_id, day, slot) == 0 {
                        assert_eq!(self.course_at(room_id, day, slot), None);
                        assert_eq!(self.lecture_at(room_id, day, slot), None);
                    }
                }
            }
        }
    }
}

// Table-wise equality; the bound model is compared by identity.
impl PartialEq for Solution<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.model, other.model)
            && self.tt == other.tt
            && self.course_at == other.course_at
            && self.lecture_at == other.lecture_at
            && self.sum_cr == other.sum_cr
            && self.sum_cd == other.sum_cd
            && self.sum_cds == other.sum_cds
            && self.sum_rds == other.sum_rds
            && self.sum_qds == other.sum_qds
            && self.sum_tds == other.sum_tds
            && self.assignments == other.assignments
    }
}

impl Eq for Solution<'_> {}
