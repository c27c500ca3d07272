use tracing::{debug, warn};

use crate::grades::GradeScale;
use crate::models::{AttemptRecord, AttemptSource, CanonicalGrades, OverrideEntry, RawAttemptRow};

/// Folds raw attempt rows into one canonical grade per subject.
///
/// Historical rows are folded first, in order, and the first row per subject
/// wins. Current-term rows then replace a record when they carry a strictly
/// higher grade, or the same grade in a strictly later year. Overrides are
/// applied last and only touch subjects that already have a record.
pub fn resolve(
    scale: &GradeScale,
    rows: &[RawAttemptRow],
    overrides: &[OverrideEntry],
) -> CanonicalGrades {
    let mut canonical = CanonicalGrades::new();

    let valid = |row: &&RawAttemptRow| scale.is_valid(&row.grade);

    for row in rows
        .iter()
        .filter(|row| row.source == AttemptSource::Historical)
        .filter(valid)
    {
        canonical
            .entry(row.subject_id.clone())
            .or_insert_with(|| AttemptRecord {
                grade: row.grade.clone(),
                year: row.year,
            });
    }

    for row in rows
        .iter()
        .filter(|row| row.source == AttemptSource::CurrentTerm)
        .filter(valid)
    {
        fold_current_term(scale, &mut canonical, row);
    }

    apply_overrides(scale, &mut canonical, overrides);

    canonical
}

fn fold_current_term(scale: &GradeScale, canonical: &mut CanonicalGrades, row: &RawAttemptRow) {
    let replace = match canonical.get(&row.subject_id) {
        None => true,
        Some(current) => supersedes(scale, row, current),
    };

    if replace {
        canonical.insert(
            row.subject_id.clone(),
            AttemptRecord {
                grade: row.grade.clone(),
                year: row.year,
            },
        );
    }
}

fn supersedes(scale: &GradeScale, row: &RawAttemptRow, current: &AttemptRecord) -> bool {
    match (scale.points_for(&row.grade), scale.points_for(&current.grade)) {
        (Some(new), Some(old)) => new > old || (new == old && row.year > current.year),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn apply_overrides(scale: &GradeScale, canonical: &mut CanonicalGrades, overrides: &[OverrideEntry]) {
    for entry in overrides {
        if entry.grade.is_empty() {
            continue;
        }

        if !scale.is_valid(&entry.grade) {
            warn!(
                subject = entry.subject_id.as_str(),
                grade = entry.grade.as_str(),
                "Ignoring retake override with unknown grade"
            );
            continue;
        }

        if let Some(record) = canonical.get_mut(&entry.subject_id) {
            debug!(
                subject = entry.subject_id.as_str(),
                from = record.grade.as_str(),
                to = entry.grade.as_str(),
                "Applied retake override"
            );
            record.grade.clone_from(&entry.grade);
        }
    }
}
