use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::Metric;
use crate::service::Evaluation;

pub fn build_report(
    stnum: &str,
    level: &str,
    generated: NaiveDate,
    evaluation: &Evaluation,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Transcript GPA Report");
    let _ = writeln!(
        output,
        "Generated for {} at level {} on {}",
        stnum, level, generated
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## GPA by Scope");

    for metric in Metric::ALL {
        let totals = evaluation.aggregation.scope(metric);
        let label = match metric {
            Metric::Total => "Overall",
            Metric::Group(group) => group.label(),
        };

        if metric != Metric::Total && totals.credits == 0.0 {
            continue;
        }

        let gpa = totals
            .ratio()
            .map_or_else(|| "n/a".to_string(), |ratio| format!("{ratio:.2}"));

        let _ = writeln!(
            output,
            "- {}: GPA {} ({} credits, {:.2} grade points)",
            label, gpa, totals.credits, totals.grade_points
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Resolved Subjects");

    if evaluation.canonical.is_empty() {
        let _ = writeln!(output, "No graded subjects found on this transcript.");
    } else {
        for (subject_id, record) in &evaluation.canonical {
            let year = record
                .year
                .map_or_else(|| "unknown year".to_string(), |year| year.to_string());

            let _ = writeln!(output, "- {}: {} ({})", subject_id, record.grade, year);
        }
    }

    output
}
