use std::collections::HashMap;

/// Letter grade to grade-point lookup.
#[derive(Debug, Clone)]
pub struct GradeScale {
    points: HashMap<&'static str, f64>,
}

const STANDARD_SCALE: [(&str, f64); 17] = [
    ("A+", 4.0),
    ("A", 4.0),
    ("A-", 3.7),
    ("B+", 3.3),
    ("B", 3.0),
    ("B-", 2.7),
    ("C+", 2.3),
    ("C", 2.0),
    ("C-", 1.7),
    ("D+", 1.3),
    ("D", 1.0),
    ("E", 0.0),
    ("E*", 0.0),
    ("E+", 0.0),
    ("E-", 0.0),
    ("F", 0.0),
    ("MC", 0.0),
];

impl GradeScale {
    pub fn standard() -> Self {
        Self {
            points: STANDARD_SCALE.into_iter().collect(),
        }
    }

    pub fn points_for(&self, grade: &str) -> Option<f64> {
        self.points.get(grade).copied()
    }

    pub fn is_valid(&self, grade: &str) -> bool {
        self.points.contains_key(grade)
    }
}

impl Default for GradeScale {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_grades_map_to_points() {
        let scale = GradeScale::standard();
        assert_eq!(scale.points_for("A+"), Some(4.0));
        assert_eq!(scale.points_for("B-"), Some(2.7));
        assert_eq!(scale.points_for("D+"), Some(1.3));
        assert_eq!(scale.points_for("MC"), Some(0.0));
    }

    #[test]
    fn unknown_grades_are_absent() {
        let scale = GradeScale::standard();
        assert_eq!(scale.points_for("G"), None);
        assert_eq!(scale.points_for("a"), None);
        assert_eq!(scale.points_for(""), None);
        assert!(!scale.is_valid(" A"));
    }
}
