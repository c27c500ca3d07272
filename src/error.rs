use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum GpaError {
    #[error("failed to fetch from upstream")]
    UpstreamFetch(#[source] reqwest::Error),
    #[error("upstream responded with status {0}")]
    UpstreamStatus(reqwest::StatusCode),
    #[error("no credit weight rule for subject `{subject}`")]
    UnclassifiableSubject { subject: String },
    #[error("subject `{subject}` resolved to unknown grade `{grade}`")]
    UnknownGrade { subject: String, grade: String },
    #[error("every cohort member in {start}..={end} failed to aggregate")]
    EmptyCohort { start: u32, end: u32 },
    #[error("invalid id range {start}..={end}")]
    InvalidRange { start: u32, end: u32 },
    #[error("no access to results for this student number")]
    AccessDenied,
    #[error("student number is marked deceased")]
    DeceasedNotice,
    #[error("retake lists differ in length ({subjects} subjects, {grades} grades)")]
    MismatchedRetakes { subjects: usize, grades: usize },
}

impl GpaError {
    pub fn response(&self) -> (StatusCode, &'static str) {
        match self {
            Self::UpstreamFetch(_) | Self::UpstreamStatus(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "no data")
            }
            Self::UnclassifiableSubject { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Transcript contains a subject without a credit weight",
            ),
            Self::UnknownGrade { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Transcript contains an unknown grade",
            ),
            Self::EmptyCohort { .. } => (
                StatusCode::BAD_GATEWAY,
                "No student in the requested range could be aggregated",
            ),
            Self::InvalidRange { .. } => (StatusCode::BAD_REQUEST, "Invalid student number range"),
            Self::AccessDenied => (
                StatusCode::FORBIDDEN,
                "No access to results for this student number",
            ),
            Self::DeceasedNotice => (StatusCode::OK, "Rest in Peace"),
            Self::MismatchedRetakes { .. } => (
                StatusCode::BAD_REQUEST,
                "Repeated subjects and grades must have the same length",
            ),
        }
    }
}
