use std::fmt;

use enum_map::EnumMap;
use strum::IntoStaticStr;

pub type Cost = i32;

#[derive(Debug, enum_map::Enum, IntoStaticStr, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum HardConstraint {
    Lectures,
    RoomOccupancy,
    Conflicts,
    Availabilities,
}

#[derive(Debug, enum_map::Enum, IntoStaticStr, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum SoftConstraint {
    RoomCapacity,
    MinWorkingDays,
    CurriculumCompactness,
    RoomStability,
}

impl SoftConstraint {
    /// Fixed ITC-2007 weights.
    pub fn weight(self) -> Cost {
        match self {
            SoftConstraint::RoomCapacity => 1,
            SoftConstraint::MinWorkingDays => 5,
            SoftConstraint::CurriculumCompactness => 2,
            SoftConstraint::RoomStability => 1,
        }
    }
}

/// Weighted soft cost per constraint family. Also used for the signed delta
/// of a candidate move, hence the signed value type.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CostCount {
    counts: EnumMap<SoftConstraint, Cost>,
}

impl CostCount {
    pub fn new() -> Self {
        CostCount::default()
    }

    pub fn clear(&mut self) {
        self.counts = EnumMap::default();
    }

    pub fn add(&mut self, family: SoftConstraint, amount: Cost) {
        self.counts[family] += amount;
    }

    pub fn get(&self, family: SoftConstraint) -> Cost {
        self.counts[family]
    }

    pub fn total(&self) -> Cost {
        self.counts.values().sum()
    }
}

impl fmt::Display for CostCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (family, count) in self.counts {
            let name: &str = family.into();
            writeln!(f, "{name}: {count}")?;
        }
        Ok(())
    }
}

/// Hard constraint violation counters; all zero means feasible.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ViolationCount {
    counts: EnumMap<HardConstraint, u32>,
}

impl ViolationCount {
    pub fn new() -> Self {
        ViolationCount::default()
    }

    pub fn add(&mut self, family: HardConstraint, amount: u32) {
        self.counts[family] += amount;
    }

    pub fn get(&self, family: HardConstraint) -> u32 {
        self.counts[family]
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn is_feasible(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for ViolationCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (family, count) in self.counts {
            let name: &str = family.into();
            writeln!(f, "{name}: {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_match_the_competition_definition() {
        assert_eq!(SoftConstraint::RoomCapacity.weight(), 1);
        assert_eq!(SoftConstraint::MinWorkingDays.weight(), 5);
        assert_eq!(SoftConstraint::CurriculumCompactness.weight(), 2);
        assert_eq!(SoftConstraint::RoomStability.weight(), 1);
    }

    #[test]
    fn total_sums_families() {
        let mut count = CostCount::new();
        count.add(SoftConstraint::RoomCapacity, 4);
        count.add(SoftConstraint::RoomStability, 1);
        count.add(SoftConstraint::RoomCapacity, 2);
        assert_eq!(count.get(SoftConstraint::RoomCapacity), 6);
        assert_eq!(count.total(), 7);
    }
}
