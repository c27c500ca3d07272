use std::collections::BTreeMap;

use crate::error::GpaError;
use crate::grades::GradeScale;
use crate::models::{AggregationResult, CanonicalGrades, Metric, SubjectGroup};
use crate::subjects::SubjectClassifier;

/// Rendered in place of a ratio when its scope has no credits.
pub const NO_RATIO: &str = "NaN";

pub fn aggregate(
    scale: &GradeScale,
    classifier: &SubjectClassifier,
    canonical: &CanonicalGrades,
) -> Result<AggregationResult, GpaError> {
    let mut result = AggregationResult::empty();

    for (subject_id, record) in canonical {
        let Some(credit) = classifier.credit_weight(subject_id)? else {
            continue;
        };

        let points = scale
            .points_for(&record.grade)
            .ok_or_else(|| GpaError::UnknownGrade {
                subject: subject_id.clone(),
                grade: record.grade.clone(),
            })?;
        let grade_points = points * credit;

        result.total.add(credit, grade_points);

        match classifier.group_for(subject_id) {
            SubjectGroup::Ungrouped => {}
            group => result
                .groups
                .entry(group)
                .or_default()
                .add(credit, grade_points),
        }
    }

    Ok(result)
}

pub fn format_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(value) if value.is_finite() => format!("{value:.2}"),
        _ => NO_RATIO.to_owned(),
    }
}

/// Two-decimal GPA per metric, keyed by `Metric::gpa_field`.
pub fn gpa_summary(result: &AggregationResult) -> BTreeMap<String, String> {
    Metric::ALL
        .into_iter()
        .map(|metric| (metric.gpa_field(), format_ratio(result.scope(metric).ratio())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttemptRecord;

    fn canonical(entries: &[(&str, &str)]) -> CanonicalGrades {
        entries
            .iter()
            .map(|(subject, grade)| {
                (
                    subject.to_string(),
                    AttemptRecord {
                        grade: grade.to_string(),
                        year: Some(2021),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn sums_total_and_groups() {
        let grades = canonical(&[("PHY2104", "A"), ("CHE1104", "B")]);
        let result = aggregate(
            &GradeScale::standard(),
            &SubjectClassifier::default(),
            &grades,
        )
        .unwrap();

        assert_eq!(result.total.credits, 8.0);
        assert!((result.total.grade_points - 28.0).abs() < 1e-9);
        assert_eq!(result.group(SubjectGroup::Physics).credits, 4.0);
        assert!((result.group(SubjectGroup::Physics).grade_points - 16.0).abs() < 1e-9);
        assert_eq!(result.group(SubjectGroup::Chemistry).credits, 4.0);
        assert!((result.group(SubjectGroup::Chemistry).grade_points - 12.0).abs() < 1e-9);
        assert_eq!(result.group(SubjectGroup::Mathematics).credits, 0.0);
    }

    #[test]
    fn non_credit_subjects_are_skipped_everywhere() {
        let grades = canonical(&[("MAT1142", "A"), ("MAT1122", "C")]);
        let result = aggregate(
            &GradeScale::standard(),
            &SubjectClassifier::default(),
            &grades,
        )
        .unwrap();

        assert_eq!(result.total.credits, 2.0);
        assert_eq!(result.group(SubjectGroup::Mathematics).credits, 2.0);
        assert!((result.group(SubjectGroup::Mathematics).grade_points - 4.0).abs() < 1e-9);
    }

    #[test]
    fn ungrouped_subjects_count_toward_total_only() {
        let grades = canonical(&[("ENG1112", "B+"), ("BOT112α", "A-")]);
        let result = aggregate(
            &GradeScale::standard(),
            &SubjectClassifier::default(),
            &grades,
        )
        .unwrap();

        assert!((result.total.credits - 3.5).abs() < 1e-9);
        assert!((result.total.grade_points - (3.3 * 2.0 + 3.7 * 1.5)).abs() < 1e-9);
        assert!((result.group(SubjectGroup::Botany).credits - 1.5).abs() < 1e-9);
        let grouped: f64 = result.groups.values().map(|totals| totals.credits).sum();
        assert!((grouped - 1.5).abs() < 1e-9);
    }

    #[test]
    fn unclassifiable_subject_aborts_aggregation() {
        let grades = canonical(&[("PHY2104", "A"), ("CHE110X", "B")]);
        let err = aggregate(
            &GradeScale::standard(),
            &SubjectClassifier::default(),
            &grades,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            GpaError::UnclassifiableSubject { subject } if subject == "CHE110X"
        ));
    }

    #[test]
    fn summary_formats_two_decimals_and_sentinel() {
        let grades = canonical(&[("PHY2103", "A"), ("PHY2101", "C")]);
        let result = aggregate(
            &GradeScale::standard(),
            &SubjectClassifier::default(),
            &grades,
        )
        .unwrap();
        let summary = gpa_summary(&result);

        assert_eq!(summary["totalGPA"], "3.50");
        assert_eq!(summary["phyGPA"], "3.50");
        assert_eq!(summary["chemGPA"], NO_RATIO);
        assert_eq!(summary.len(), 7);
    }

    #[test]
    fn zero_weight_subjects_keep_ratio_undefined() {
        let grades = canonical(&[("CHE3120", "A")]);
        let result = aggregate(
            &GradeScale::standard(),
            &SubjectClassifier::default(),
            &grades,
        )
        .unwrap();

        assert_eq!(result.total.credits, 0.0);
        assert_eq!(format_ratio(result.total.ratio()), NO_RATIO);
    }
}
