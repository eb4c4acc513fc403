//! Parser for the ITC-2007 curriculum-based course timetabling instance
//! format: a key/value header followed by the COURSES, ROOMS, CURRICULA and
//! UNAVAILABILITY_CONSTRAINTS sections.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use thiserror::Error;

use crate::model::{CourseId, CourseSpec, Curriculum, Model, Room};

#[derive(Debug, Error)]
#[error("{file}:{line}: {message}")]
pub struct InputError {
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl InputError {
    fn new(file: &str, line: usize, message: String) -> Self {
        InputError {
            file: file.into(),
            line,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Courses,
    Rooms,
    Curricula,
    Constraints,
}

#[derive(Default)]
struct Header {
    name: Option<String>,
    n_courses: Option<usize>,
    n_rooms: Option<usize>,
    n_days: Option<usize>,
    n_slots: Option<usize>,
    n_curricula: Option<usize>,
    n_constraints: Option<usize>,
}

pub fn read_from_path(path: &Path) -> Result<Model> {
    let text = fs::read_to_string(path)
        .with_context(|| anyhow!("failed to read instance at {}", path.display()))?;
    let model = try_from_str(&path.to_string_lossy(), &text)?;
    Ok(model)
}

pub fn try_from_str(filename: &str, text: &str) -> Result<Model, InputError> {
    let fail = |line: usize, message: String| InputError::new(filename, line, message);

    let mut header = Header::default();
    let mut section = Section::None;

    let mut courses: Vec<CourseSpec> = Vec::new();
    let mut rooms: Vec<Room> = Vec::new();
    let mut curricula: Vec<Curriculum> = Vec::new();
    let mut unavailabilities: Vec<(CourseId, usize, usize)> = Vec::new();

    let mut course_index: HashMap<String, CourseId> = HashMap::new();
    let mut room_ids: HashMap<String, usize> = HashMap::new();
    let mut curriculum_ids: HashMap<String, usize> = HashMap::new();

    let parse_count = |field: &str, line: usize, what: &str| -> Result<usize, InputError> {
        field
            .parse::<usize>()
            .map_err(|_| fail(line, format!("bad {what}: {field:?} is not a non-negative integer")))
    };

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            "COURSES:" => {
                section = Section::Courses;
                continue;
            }
            "ROOMS:" => {
                section = Section::Rooms;
                continue;
            }
            "CURRICULA:" => {
                section = Section::Curricula;
                continue;
            }
            "UNAVAILABILITY_CONSTRAINTS:" => {
                section = Section::Constraints;
                continue;
            }
            "END." => break,
            _ => {}
        }

        if section == Section::None {
            let (key, value) = trimmed
                .split_once(':')
                .ok_or_else(|| fail(line, format!("expected 'Key: value' header, got {trimmed:?}")))?;
            let value = value.trim();
            match key {
                "Name" => header.name = Some(value.into()),
                "Courses" => header.n_courses = Some(parse_count(value, line, "course count")?),
                "Rooms" => header.n_rooms = Some(parse_count(value, line, "room count")?),
                "Days" => header.n_days = Some(parse_count(value, line, "day count")?),
                "Periods_per_day" => {
                    header.n_slots = Some(parse_count(value, line, "periods per day")?)
                }
                "Curricula" => {
                    header.n_curricula = Some(parse_count(value, line, "curricula count")?)
                }
                "Constraints" => {
                    header.n_constraints = Some(parse_count(value, line, "constraint count")?)
                }
                _ => return Err(fail(line, format!("unknown header key {key:?}"))),
            }
            continue;
        }

        let n_days = header
            .n_days
            .ok_or_else(|| fail(line, "Days: header must precede the sections".into()))?;
        let n_slots = header
            .n_slots
            .ok_or_else(|| fail(line, "Periods_per_day: header must precede the sections".into()))?;

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        match section {
            Section::None => unreachable!(),
            Section::Courses => {
                let &[id, teacher_id, n_lectures, min_working_days, n_students] =
                    fields.as_slice()
                else {
                    return Err(fail(
                        line,
                        format!("expected 5 course fields, got {}", fields.len()),
                    ));
                };
                let n_lectures = parse_count(n_lectures, line, "lecture count")?;
                let min_working_days = parse_count(min_working_days, line, "minimum working days")?;
                let n_students = parse_count(n_students, line, "student count")?;
                if n_lectures == 0 {
                    return Err(fail(line, format!("course {id:?} has no lectures")));
                }
                if min_working_days == 0 {
                    return Err(fail(line, format!("course {id:?} has zero minimum working days")));
                }
                if course_index
                    .insert(id.into(), CourseId::from_index(courses.len()))
                    .is_some()
                {
                    return Err(fail(line, format!("duplicate course id {id:?}")));
                }
                courses.push(CourseSpec {
                    id: id.into(),
                    teacher_id: teacher_id.into(),
                    n_lectures,
                    min_working_days,
                    n_students,
                });
            }
            Section::Rooms => {
                let &[id, capacity] = fields.as_slice() else {
                    return Err(fail(
                        line,
                        format!("expected 2 room fields, got {}", fields.len()),
                    ));
                };
                let capacity = parse_count(capacity, line, "room capacity")?;
                if room_ids.insert(id.into(), rooms.len()).is_some() {
                    return Err(fail(line, format!("duplicate room id {id:?}")));
                }
                rooms.push(Room {
                    id: id.into(),
                    capacity,
                });
            }
            Section::Curricula => {
                if fields.len() < 2 {
                    return Err(fail(line, "expected curriculum id and course count".into()));
                }
                let id = fields[0];
                let n_members = parse_count(fields[1], line, "curriculum course count")?;
                let member_ids = &fields[2..];
                if member_ids.len() != n_members {
                    return Err(fail(
                        line,
                        format!(
                            "curriculum {id:?} declares {n_members} courses but lists {}",
                            member_ids.len()
                        ),
                    ));
                }
                let members = member_ids
                    .iter()
                    .map(|member| {
                        course_index
                            .get(*member)
                            .copied()
                            .ok_or_else(|| fail(line, format!("unknown course {member:?}")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if curriculum_ids.insert(id.into(), curricula.len()).is_some() {
                    return Err(fail(line, format!("duplicate curriculum id {id:?}")));
                }
                curricula.push(Curriculum {
                    id: id.into(),
                    courses: members,
                });
            }
            Section::Constraints => {
                let &[course, day, slot] = fields.as_slice() else {
                    return Err(fail(
                        line,
                        format!("expected 3 constraint fields, got {}", fields.len()),
                    ));
                };
                let course = *course_index
                    .get(course)
                    .ok_or_else(|| fail(line, format!("unknown course {course:?}")))?;
                let day = parse_count(day, line, "day")?;
                let slot = parse_count(slot, line, "slot")?;
                if day >= n_days || slot >= n_slots {
                    return Err(fail(
                        line,
                        format!("period (day={day}, slot={slot}) is out of range"),
                    ));
                }
                unavailabilities.push((course, day, slot));
            }
        }
    }

    let end = text.lines().count();
    let check_count = |declared: Option<usize>, actual: usize, what: &str| {
        match declared {
            Some(declared) if declared != actual => Err(fail(
                end,
                format!("header declares {declared} {what} but {actual} were listed"),
            )),
            Some(_) => Ok(()),
            None => Err(fail(end, format!("missing header count for {what}"))),
        }
    };
    check_count(header.n_courses, courses.len(), "courses")?;
    check_count(header.n_rooms, rooms.len(), "rooms")?;
    check_count(header.n_curricula, curricula.len(), "curricula")?;
    check_count(header.n_constraints, unavailabilities.len(), "constraints")?;
    let n_days = header
        .n_days
        .ok_or_else(|| fail(end, "missing Days: header".into()))?;
    let n_slots = header
        .n_slots
        .ok_or_else(|| fail(end, "missing Periods_per_day: header".into()))?;
    if n_days == 0 || n_slots == 0 {
        return Err(fail(end, "the week must have at least one period".into()));
    }

    Ok(Model::finalize(
        header.name.unwrap_or_default(),
        n_days,
        n_slots,
        courses,
        rooms,
        curricula,
        unavailabilities,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: &str = "\
Name: Tiny
Courses: 2
Rooms: 2
Days: 2
Periods_per_day: 2
Curricula: 1
Constraints: 1

COURSES:
cA tX 2 2 10
cB tY 1 1 25

ROOMS:
rSmall 12
rBig 30

CURRICULA:
q0 2 cA cB

UNAVAILABILITY_CONSTRAINTS:
cA 1 0

END.
";

    #[test]
    fn parses_a_complete_instance() {
        let model = try_from_str("tiny.ctt", TINY).unwrap();
        assert_eq!(model.name(), "Tiny");
        assert_eq!(model.n_courses(), 2);
        assert_eq!(model.n_rooms(), 2);
        assert_eq!(model.n_days(), 2);
        assert_eq!(model.n_slots(), 2);
        assert_eq!(model.n_curricula(), 1);
        assert_eq!(model.n_lectures(), 3);

        let c_a = model.course_by_id("cA").unwrap();
        assert!(!model.available(c_a, 1, 0));
        assert!(model.available(c_a, 0, 0));
        assert_eq!(model.room(model.room_by_id("rBig").unwrap()).capacity, 30);
    }

    #[test]
    fn unknown_course_in_curriculum_is_an_error_with_line() {
        let bad = TINY.replace("q0 2 cA cB", "q0 2 cA cMissing");
        let err = try_from_str("tiny.ctt", &bad).unwrap_err();
        assert_eq!(err.line, 18);
        assert!(err.message.contains("cMissing"), "{}", err.message);
    }

    #[test]
    fn count_mismatch_is_an_error() {
        let bad = TINY.replace("Rooms: 2", "Rooms: 3");
        let err = try_from_str("tiny.ctt", &bad).unwrap_err();
        assert!(err.message.contains("3 rooms"), "{}", err.message);
    }

    #[test]
    fn out_of_range_period_is_an_error() {
        let bad = TINY.replace("cA 1 0", "cA 2 0");
        let err = try_from_str("tiny.ctt", &bad).unwrap_err();
        assert!(err.message.contains("out of range"), "{}", err.message);
    }

    #[test]
    fn malformed_course_row_is_an_error() {
        let bad = TINY.replace("cB tY 1 1 25", "cB tY 1 1");
        let err = try_from_str("tiny.ctt", &bad).unwrap_err();
        assert!(err.message.contains("expected 5"), "{}", err.message);
    }
}
