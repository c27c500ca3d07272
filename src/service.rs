use std::sync::Arc;

use tracing::debug;

use crate::access::AccessPolicy;
use crate::aggregate;
use crate::error::GpaError;
use crate::grades::GradeScale;
use crate::markup;
use crate::models::{AggregationResult, CanonicalGrades, OverrideEntry, RawAttemptRow};
use crate::resolver;
use crate::subjects::SubjectClassifier;
use crate::upstream::TranscriptSource;

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub canonical: CanonicalGrades,
    pub aggregation: AggregationResult,
}

/// Resolve-then-aggregate over rows that are already parsed.
pub fn evaluate_rows(
    scale: &GradeScale,
    classifier: &SubjectClassifier,
    rows: &[RawAttemptRow],
    overrides: &[OverrideEntry],
) -> Result<Evaluation, GpaError> {
    let canonical = resolver::resolve(scale, rows, overrides);
    let aggregation = aggregate::aggregate(scale, classifier, &canonical)?;

    Ok(Evaluation {
        canonical,
        aggregation,
    })
}

pub struct TranscriptService {
    source: Arc<dyn TranscriptSource>,
    access: AccessPolicy,
    scale: GradeScale,
    classifier: SubjectClassifier,
}

impl TranscriptService {
    pub fn new(
        source: Arc<dyn TranscriptSource>,
        access: AccessPolicy,
        scale: GradeScale,
        classifier: SubjectClassifier,
    ) -> Self {
        Self {
            source,
            access,
            scale,
            classifier,
        }
    }

    pub async fn evaluate(
        &self,
        stnum: &str,
        level: &str,
        session: Option<&str>,
        overrides: &[OverrideEntry],
    ) -> Result<Evaluation, GpaError> {
        let lookup = self.access.check(stnum)?;
        let markup = self.source.fetch_markup(lookup, level, session).await?;
        let rows = markup::parse_transcript(&markup);

        debug!(stnum = lookup, rows = rows.len(), "Parsed transcript");

        evaluate_rows(&self.scale, &self.classifier, &rows, overrides)
    }
}
