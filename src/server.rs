use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Span};

use crate::aggregate;
use crate::error::GpaError;
use crate::models::{AggregationResult, Metric, OverrideEntry, RankStats};
use crate::ranking::RankingService;
use crate::service::TranscriptService;

pub struct AppState {
    pub transcripts: TranscriptService,
    pub ranking: RankingService,
}

pub fn router(state: Arc<AppState>) -> Router {
    let trace = TraceLayer::new_for_http()
        .on_request(|req: &Request<Body>, _: &Span| info!("{} {}", req.method(), req.uri().path()))
        .on_response(|res: &Response, latency: Duration, _: &Span| {
            let code = res.status().as_u16();

            if (500..600).contains(&code) {
                error!("Response: latency={}ms status={code}", latency.as_millis());
            } else {
                info!("Response: latency={}ms status={code}", latency.as_millis());
            }
        });

    Router::new()
        .route("/creditresults", post(credit_results))
        .route("/gparesults", get(gpa_results))
        .route("/rank", get(rank))
        .layer(trace)
        .with_state(state)
}

pub async fn run(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    info!("Running server on port {port}...");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down server");
        })
        .await?;

    Ok(())
}

impl IntoResponse for GpaError {
    fn into_response(self) -> Response {
        let (status, msg) = self.response();
        let plain = matches!(self, Self::UpstreamFetch(_) | Self::UpstreamStatus(_));

        if !matches!(self, Self::AccessDenied | Self::DeceasedNotice) {
            warn!("{:?}", anyhow::Error::new(self));
        }

        if plain {
            (status, msg).into_response()
        } else {
            (status, Json(serde_json::json!({ "message": msg }))).into_response()
        }
    }
}

#[derive(Deserialize)]
struct StudentParams {
    stnum: String,
    rlevel: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditBody {
    #[serde(default)]
    repeated_subjects: RepeatedSubjects,
}

#[derive(Default, Deserialize)]
struct RepeatedSubjects {
    #[serde(default)]
    subjects: Vec<String>,
    #[serde(default)]
    grades: Vec<String>,
}

impl RepeatedSubjects {
    fn into_overrides(self) -> Result<Vec<OverrideEntry>, GpaError> {
        if self.subjects.len() != self.grades.len() {
            return Err(GpaError::MismatchedRetakes {
                subjects: self.subjects.len(),
                grades: self.grades.len(),
            });
        }

        let overrides = self
            .subjects
            .into_iter()
            .zip(self.grades)
            .map(|(subject_id, grade)| OverrideEntry { subject_id, grade })
            .collect();

        Ok(overrides)
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn credit_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StudentParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AggregationResult>, Response> {
    let body: CreditBody = if body.iter().all(u8::is_ascii_whitespace) {
        CreditBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|err| {
            warn!(?err, "Malformed credit results body");

            (
                axum::http::StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "message": "Malformed request body" })),
            )
                .into_response()
        })?
    };

    let overrides = body
        .repeated_subjects
        .into_overrides()
        .map_err(IntoResponse::into_response)?;

    let evaluation = state
        .transcripts
        .evaluate(&params.stnum, &params.rlevel, bearer(&headers), &overrides)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(evaluation.aggregation))
}

async fn gpa_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StudentParams>,
    headers: HeaderMap,
) -> Result<Json<BTreeMap<String, String>>, GpaError> {
    let evaluation = state
        .transcripts
        .evaluate(&params.stnum, &params.rlevel, bearer(&headers), &[])
        .await?;

    Ok(Json(aggregate::gpa_summary(&evaluation.aggregation)))
}

#[derive(Deserialize)]
struct RankParams {
    start: u32,
    end: u32,
    stnum: u32,
    metric: Option<Metric>,
}

async fn rank(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RankParams>,
) -> Result<Json<RankStats>, GpaError> {
    let metric = params.metric.unwrap_or(Metric::Total);
    let stats = state
        .ranking
        .rank(params.start, params.end, metric, params.stnum)
        .await?;

    Ok(Json(stats))
}
