//! Solution file format: one `<course_id> <room_id> <day> <slot>` line per
//! lecture. The reader hands each course's lines to its lectures in
//! first-seen order, which is also the order the writer produces.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use itertools::Itertools;

use crate::instance::InputError;
use crate::model::LectureId;
use crate::solution::{Assignment, Solution};

pub fn to_string(sol: &Solution) -> String {
    let model = sol.model();
    let mut out = String::new();
    for l in 0..model.n_lectures() {
        let lecture = LectureId::from_index(l);
        let Some(Assignment { room, day, slot }) = sol.assignment(lecture) else {
            continue;
        };
        let course = model.course(model.lecture(lecture).course);
        let _ = writeln!(out, "{} {} {day} {slot}", course.id, model.room(room).id);
    }
    out
}

pub fn write_to_path(sol: &Solution, path: &Path) -> Result<()> {
    if !sol.is_complete() {
        bail!(
            "refusing to write a partial solution ({}/{} lectures assigned)",
            sol.assigned_count(),
            sol.model().n_lectures()
        );
    }
    fs::write(path, to_string(sol))
        .with_context(|| anyhow!("failed to write solution to {}", path.display()))
}

pub fn read_from_path(path: &Path, sol: &mut Solution) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| anyhow!("failed to read solution at {}", path.display()))?;
    try_parse_into(&path.to_string_lossy(), &text, sol)?;
    Ok(())
}

pub fn try_parse_into(filename: &str, text: &str, sol: &mut Solution) -> Result<(), InputError> {
    let fail = |line: usize, message: String| InputError {
        file: filename.into(),
        line,
        message,
    };
    let model = sol.model();

    // First lecture index of each course: lectures are course-major.
    let mut first_lecture = Vec::with_capacity(model.n_courses());
    let mut base = 0;
    for c in 0..model.n_courses() {
        first_lecture.push(base);
        base += model
            .course(crate::model::CourseId::from_index(c))
            .n_lectures;
    }
    let mut next_lecture = first_lecture.clone();

    sol.clear();

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (course_id, room_id, day, slot) =
            trimmed.split_whitespace().collect_tuple().ok_or_else(|| {
                fail(
                    line,
                    format!(
                        "expected 4 assignment fields, got {}",
                        trimmed.split_whitespace().count()
                    ),
                )
            })?;

        let course = model
            .course_by_id(course_id)
            .ok_or_else(|| fail(line, format!("unknown course {course_id:?}")))?;
        let room = model
            .room_by_id(room_id)
            .ok_or_else(|| fail(line, format!("unknown room {room_id:?}")))?;
        let day: usize = day
            .parse()
            .map_err(|_| fail(line, format!("bad day {day:?}")))?;
        let slot: usize = slot
            .parse()
            .map_err(|_| fail(line, format!("bad slot {slot:?}")))?;
        if day >= model.n_days() || slot >= model.n_slots() {
            return Err(fail(
                line,
                format!("period (day={day}, slot={slot}) is out of range"),
            ));
        }

        let course_entry = model.course(course);
        let lecture_index = next_lecture[course.raw_index()];
        if lecture_index >= first_lecture[course.raw_index()] + course_entry.n_lectures {
            return Err(fail(
                line,
                format!(
                    "course {:?} has more assignment lines than its {} lectures",
                    course_entry.id, course_entry.n_lectures
                ),
            ));
        }
        next_lecture[course.raw_index()] += 1;

        sol.assign_lecture(
            LectureId::from_index(lecture_index),
            Assignment { room, day, slot },
        );
    }

    if !sol.is_complete() {
        let end = text.lines().count();
        return Err(fail(
            end,
            format!(
                "solution assigns {}/{} lectures",
                sol.assigned_count(),
                model.n_lectures()
            ),
        ));
    }

    Ok(())
}
