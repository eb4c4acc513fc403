use std::collections::HashMap;

use bit_set::BitSet;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u16);

        impl $name {
            pub fn from_index(index: usize) -> Self {
                $name(index as u16)
            }

            pub fn raw_index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

entity_id!(CourseId);
entity_id!(RoomId);
entity_id!(CurriculumId);
entity_id!(TeacherId);
entity_id!(LectureId);

#[derive(Debug)]
pub struct Course {
    pub id: String,
    pub teacher: TeacherId,
    pub n_lectures: usize,
    pub min_working_days: usize,
    pub n_students: usize,
}

#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub capacity: usize,
}

#[derive(Debug)]
pub struct Curriculum {
    pub id: String,
    pub courses: Vec<CourseId>,
}

// Implicit entity: teachers are derived from the teacher names on courses.
#[derive(Debug)]
pub struct Teacher {
    pub id: String,
    pub courses: Vec<CourseId>,
}

// Implicit entity: one per lecture of each course, course-major order.
#[derive(Debug, Clone, Copy)]
pub struct Lecture {
    pub course: CourseId,
}

/// Course as read from the instance file, before teachers are derived.
#[derive(Debug)]
pub struct CourseSpec {
    pub id: String,
    pub teacher_id: String,
    pub n_lectures: usize,
    pub min_working_days: usize,
    pub n_students: usize,
}

/// The immutable problem instance plus every derived lookup table the
/// solver needs for O(1) queries. Built once, read-only afterwards.
#[derive(Debug)]
pub struct Model {
    name: String,
    n_days: usize,
    n_slots: usize,

    courses: Vec<Course>,
    rooms: Vec<Room>,
    curricula: Vec<Curriculum>,
    teachers: Vec<Teacher>,
    lectures: Vec<Lecture>,

    course_index: HashMap<String, CourseId>,
    room_index: HashMap<String, RoomId>,
    curriculum_index: HashMap<String, CurriculumId>,
    teacher_index: HashMap<String, TeacherId>,

    curricula_of_course: Vec<Vec<CurriculumId>>,
    belongs: BitSet,    // q * C + c
    unavailable: BitSet, // (c * D + d) * S + s

    // Static placement-difficulty scores, precomputed here so that
    // multistart cycles never recompute them.
    difficulty: Vec<u32>,
}

impl Model {
    /// Finalizes a parsed instance: derives the implicit entities
    /// (teachers, lectures) and all lookup tables.
    ///
    /// Id references inside `curricula` and `unavailabilities` have already
    /// been resolved by the parser, which is the layer that can report the
    /// offending file and line.
    pub fn finalize(
        name: String,
        n_days: usize,
        n_slots: usize,
        course_specs: Vec<CourseSpec>,
        rooms: Vec<Room>,
        curricula: Vec<Curriculum>,
        unavailabilities: Vec<(CourseId, usize, usize)>,
    ) -> Model {
        let n_courses = course_specs.len();

        let mut teachers: Vec<Teacher> = Vec::new();
        let mut teacher_index: HashMap<String, TeacherId> = HashMap::new();
        let mut courses = Vec::with_capacity(n_courses);
        let mut lectures = Vec::new();

        for (c, spec) in course_specs.into_iter().enumerate() {
            let course_id = CourseId::from_index(c);
            let teacher = *teacher_index.entry(spec.teacher_id.clone()).or_insert_with(|| {
                teachers.push(Teacher {
                    id: spec.teacher_id.clone(),
                    courses: Vec::new(),
                });
                TeacherId::from_index(teachers.len() - 1)
            });
            teachers[teacher.raw_index()].courses.push(course_id);

            for _ in 0..spec.n_lectures {
                lectures.push(Lecture { course: course_id });
            }

            courses.push(Course {
                id: spec.id,
                teacher,
                n_lectures: spec.n_lectures,
                min_working_days: spec.min_working_days,
                n_students: spec.n_students,
            });
        }

        let course_index = courses
            .iter()
            .enumerate()
            .map(|(c, course)| (course.id.clone(), CourseId::from_index(c)))
            .collect();
        let room_index = rooms
            .iter()
            .enumerate()
            .map(|(r, room)| (room.id.clone(), RoomId::from_index(r)))
            .collect();
        let curriculum_index = curricula
            .iter()
            .enumerate()
            .map(|(q, curriculum)| (curriculum.id.clone(), CurriculumId::from_index(q)))
            .collect();

        let mut belongs = BitSet::with_capacity(curricula.len() * n_courses);
        let mut curricula_of_course = vec![Vec::new(); n_courses];
        for (q, curriculum) in curricula.iter().enumerate() {
            for &course in &curriculum.courses {
                belongs.insert(q * n_courses + course.raw_index());
                curricula_of_course[course.raw_index()].push(CurriculumId::from_index(q));
            }
        }

        let mut unavailable = BitSet::with_capacity(n_courses * n_days * n_slots);
        for (course, day, slot) in unavailabilities {
            unavailable.insert((course.raw_index() * n_days + day) * n_slots + slot);
        }

        let mut model = Model {
            name,
            n_days,
            n_slots,
            courses,
            rooms,
            curricula,
            teachers,
            lectures,
            course_index,
            room_index,
            curriculum_index,
            teacher_index,
            curricula_of_course,
            belongs,
            unavailable,
            difficulty: Vec::new(),
        };
        model.difficulty = model.compute_difficulty();
        model
    }

    // A course is hard to place if it carries many constraints: curriculum
    // memberships, siblings under the same teacher, unavailable periods.
    fn compute_difficulty(&self) -> Vec<u32> {
        (0..self.n_courses())
            .map(|c| {
                let course_id = CourseId::from_index(c);
                let course = self.course(course_id);

                let n_curricula = self.curricula_of_course(course_id).len();
                let n_teacher_courses = self.courses_of_teacher(course.teacher).len();
                let n_unavailable = (0..self.n_days)
                    .flat_map(|d| (0..self.n_slots).map(move |s| (d, s)))
                    .filter(|&(d, s)| !self.available(course_id, d, s))
                    .count();

                let base = (n_curricula + n_teacher_courses + n_unavailable) as u32;
                base * (course.n_lectures.max(1) as u32)
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_courses(&self) -> usize {
        self.courses.len()
    }

    pub fn n_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn n_days(&self) -> usize {
        self.n_days
    }

    pub fn n_slots(&self) -> usize {
        self.n_slots
    }

    pub fn n_periods(&self) -> usize {
        self.n_days * self.n_slots
    }

    pub fn n_curricula(&self) -> usize {
        self.curricula.len()
    }

    pub fn n_teachers(&self) -> usize {
        self.teachers.len()
    }

    pub fn n_lectures(&self) -> usize {
        self.lectures.len()
    }

    pub fn course(&self, c: CourseId) -> &Course {
        &self.courses[c.raw_index()]
    }

    pub fn room(&self, r: RoomId) -> &Room {
        &self.rooms[r.raw_index()]
    }

    pub fn curriculum(&self, q: CurriculumId) -> &Curriculum {
        &self.curricula[q.raw_index()]
    }

    pub fn teacher(&self, t: TeacherId) -> &Teacher {
        &self.teachers[t.raw_index()]
    }

    pub fn lecture(&self, l: LectureId) -> Lecture {
        self.lectures[l.raw_index()]
    }

    pub fn course_by_id(&self, id: &str) -> Option<CourseId> {
        self.course_index.get(id).copied()
    }

    pub fn room_by_id(&self, id: &str) -> Option<RoomId> {
        self.room_index.get(id).copied()
    }

    pub fn curriculum_by_id(&self, id: &str) -> Option<CurriculumId> {
        self.curriculum_index.get(id).copied()
    }

    pub fn teacher_by_id(&self, id: &str) -> Option<TeacherId> {
        self.teacher_index.get(id).copied()
    }

    pub fn belongs(&self, q: CurriculumId, c: CourseId) -> bool {
        self.belongs.contains(q.raw_index() * self.n_courses() + c.raw_index())
    }

    pub fn taught_by(&self, c: CourseId, t: TeacherId) -> bool {
        self.course(c).teacher == t
    }

    pub fn available(&self, c: CourseId, day: usize, slot: usize) -> bool {
        !self
            .unavailable
            .contains((c.raw_index() * self.n_days + day) * self.n_slots + slot)
    }

    pub fn curricula_of_course(&self, c: CourseId) -> &[CurriculumId] {
        &self.curricula_of_course[c.raw_index()]
    }

    pub fn courses_of_curriculum(&self, q: CurriculumId) -> &[CourseId] {
        &self.curriculum(q).courses
    }

    pub fn courses_of_teacher(&self, t: TeacherId) -> &[CourseId] {
        &self.teacher(t).courses
    }

    pub fn share_curriculum(&self, c1: CourseId, c2: CourseId, q: CurriculumId) -> bool {
        self.belongs(q, c1) && self.belongs(q, c2)
    }

    pub fn same_teacher(&self, c1: CourseId, c2: CourseId) -> bool {
        self.course(c1).teacher == self.course(c2).teacher
    }

    pub fn difficulty(&self, c: CourseId) -> u32 {
        self.difficulty[c.raw_index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_course_model() -> Model {
        Model::finalize(
            "test".into(),
            2,
            2,
            vec![
                CourseSpec {
                    id: "c1".into(),
                    teacher_id: "t1".into(),
                    n_lectures: 2,
                    min_working_days: 2,
                    n_students: 10,
                },
                CourseSpec {
                    id: "c2".into(),
                    teacher_id: "t1".into(),
                    n_lectures: 1,
                    min_working_days: 1,
                    n_students: 20,
                },
            ],
            vec![Room {
                id: "rA".into(),
                capacity: 15,
            }],
            vec![Curriculum {
                id: "q1".into(),
                courses: vec![CourseId::from_index(0), CourseId::from_index(1)],
            }],
            vec![(CourseId::from_index(0), 1, 1)],
        )
    }

    #[test]
    fn finalize_derives_teachers_and_lectures() {
        let model = two_course_model();
        assert_eq!(model.n_teachers(), 1);
        assert_eq!(model.n_lectures(), 3);
        assert_eq!(model.lecture(LectureId::from_index(2)).course, CourseId::from_index(1));
        assert_eq!(
            model.courses_of_teacher(TeacherId::from_index(0)).len(),
            2
        );
        assert!(model.same_teacher(CourseId::from_index(0), CourseId::from_index(1)));
    }

    #[test]
    fn finalize_derives_curriculum_tables() {
        let model = two_course_model();
        let q = model.curriculum_by_id("q1").unwrap();
        let c1 = model.course_by_id("c1").unwrap();
        let c2 = model.course_by_id("c2").unwrap();
        assert!(model.belongs(q, c1));
        assert!(model.share_curriculum(c1, c2, q));
        assert_eq!(model.curricula_of_course(c2), &[q]);
    }

    #[test]
    fn availability_defaults_to_true() {
        let model = two_course_model();
        let c1 = model.course_by_id("c1").unwrap();
        assert!(model.available(c1, 0, 0));
        assert!(!model.available(c1, 1, 1));
    }

    #[test]
    fn difficulty_scales_with_constraints_and_lectures() {
        let model = two_course_model();
        let c1 = model.course_by_id("c1").unwrap();
        let c2 = model.course_by_id("c2").unwrap();
        // c1: 1 curriculum + 2 teacher courses + 1 unavailable period, 2 lectures.
        assert_eq!(model.difficulty(c1), (1 + 2 + 1) * 2);
        // c2: 1 curriculum + 2 teacher courses, 1 lecture.
        assert_eq!(model.difficulty(c2), 3);
    }
}
