use std::path::Path;

use anyhow::Context;

use crate::markup::parse_year;
use crate::models::{AttemptSource, RawAttemptRow};

pub fn read_rows(csv_path: &Path) -> anyhow::Result<Vec<RawAttemptRow>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        subject_id: String,
        grade: String,
        #[serde(default)]
        year: String,
        source: AttemptSource,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut rows = Vec::new();

    for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid attempt row {}", idx + 1))?;

        rows.push(RawAttemptRow {
            subject_id: row.subject_id.trim().to_owned(),
            grade: row.grade.trim().to_owned(),
            year: parse_year(&row.year),
            source: row.source,
        });
    }

    Ok(rows)
}
