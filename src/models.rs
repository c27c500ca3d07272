use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptSource {
    Historical,
    CurrentTerm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttemptRow {
    pub subject_id: String,
    pub grade: String,
    /// `None` when the year could not be parsed; orders below every real year.
    pub year: Option<i32>,
    pub source: AttemptSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub grade: String,
    pub year: Option<i32>,
}

/// Canonical grade per subject, ordered by subject id.
pub type CanonicalGrades = BTreeMap<String, AttemptRecord>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideEntry {
    pub subject_id: String,
    pub grade: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubjectGroup {
    Mathematics,
    Chemistry,
    Physics,
    Zoology,
    Botany,
    ComputerScience,
    Ungrouped,
}

impl SubjectGroup {
    /// Groups that get their own bucket in an aggregation.
    pub const BUCKETED: [SubjectGroup; 6] = [
        SubjectGroup::Mathematics,
        SubjectGroup::Chemistry,
        SubjectGroup::Physics,
        SubjectGroup::Zoology,
        SubjectGroup::Botany,
        SubjectGroup::ComputerScience,
    ];

    /// Short field prefix used on the wire, e.g. `chem` in `chemCredits`.
    pub fn key(self) -> Option<&'static str> {
        match self {
            SubjectGroup::Mathematics => Some("math"),
            SubjectGroup::Chemistry => Some("chem"),
            SubjectGroup::Physics => Some("phy"),
            SubjectGroup::Zoology => Some("zoo"),
            SubjectGroup::Botany => Some("bot"),
            SubjectGroup::ComputerScience => Some("cs"),
            SubjectGroup::Ungrouped => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SubjectGroup::Mathematics => "Mathematics",
            SubjectGroup::Chemistry => "Chemistry",
            SubjectGroup::Physics => "Physics",
            SubjectGroup::Zoology => "Zoology",
            SubjectGroup::Botany => "Botany",
            SubjectGroup::ComputerScience => "Computer Science",
            SubjectGroup::Ungrouped => "Ungrouped",
        }
    }
}

/// Scope a ratio is ranked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Metric {
    Total,
    Group(SubjectGroup),
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Total,
        Metric::Group(SubjectGroup::Mathematics),
        Metric::Group(SubjectGroup::Chemistry),
        Metric::Group(SubjectGroup::Physics),
        Metric::Group(SubjectGroup::Zoology),
        Metric::Group(SubjectGroup::Botany),
        Metric::Group(SubjectGroup::ComputerScience),
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Total => "total",
            Metric::Group(group) => group.key().unwrap_or("ungrouped"),
        }
    }

    /// Field name in a per-student GPA summary, e.g. `mathGPA`.
    pub fn gpa_field(self) -> String {
        format!("{}GPA", self.key())
    }
}

impl TryFrom<String> for Metric {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown metric `{s}`, expected one of total, math, chem, phy, zoo, bot, cs")
            })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScopeTotals {
    pub credits: f64,
    pub grade_points: f64,
}

impl ScopeTotals {
    pub fn add(&mut self, credits: f64, grade_points: f64) {
        self.credits += credits;
        self.grade_points += grade_points;
    }

    /// `None` when the scope carries no credits.
    pub fn ratio(&self) -> Option<f64> {
        if self.credits == 0.0 {
            None
        } else {
            Some(self.grade_points / self.credits)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub total: ScopeTotals,
    pub groups: BTreeMap<SubjectGroup, ScopeTotals>,
}

impl AggregationResult {
    pub fn empty() -> Self {
        Self {
            total: ScopeTotals::default(),
            groups: SubjectGroup::BUCKETED
                .into_iter()
                .map(|group| (group, ScopeTotals::default()))
                .collect(),
        }
    }

    pub fn group(&self, group: SubjectGroup) -> ScopeTotals {
        self.groups.get(&group).copied().unwrap_or_default()
    }

    pub fn scope(&self, metric: Metric) -> ScopeTotals {
        match metric {
            Metric::Total => self.total,
            Metric::Group(group) => self.group(group),
        }
    }
}

impl Serialize for AggregationResult {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(2 + 2 * self.groups.len()))?;

        map.serialize_entry("totalGradePoints", &self.total.grade_points)?;
        map.serialize_entry("totalCredits", &self.total.credits)?;

        for (group, totals) in &self.groups {
            if let Some(key) = group.key() {
                map.serialize_entry(&format!("{key}GradePoints"), &totals.grade_points)?;
                map.serialize_entry(&format!("{key}Credits"), &totals.credits)?;
            }
        }

        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohortEntry {
    pub id: u32,
    pub metric_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankStats {
    pub total_count: usize,
    /// 1-based; `None` when the target is not part of the cohort.
    pub rank: Option<usize>,
    pub highest_gpa: f64,
    pub lowest_gpa: f64,
    pub average_gpa: f64,
}
