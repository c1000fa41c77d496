use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{DiversityRating, RankingBallot, SingleRating};
use super::service::{ServiceError, SurveyService};
use super::store::ResponseStore;
use crate::session::RaterId;

/// Router builder exposing the participant-facing survey endpoints.
pub fn survey_router<S>(service: Arc<SurveyService<S>>) -> Router
where
    S: ResponseStore + 'static,
{
    Router::new()
        .route("/api/v1/survey/plan", get(plan_handler::<S>))
        .route("/api/v1/survey/a/next", get(next_single_handler::<S>))
        .route("/api/v1/survey/a", post(submit_single_handler::<S>))
        .route("/api/v1/survey/b/next", get(next_ranking_handler::<S>))
        .route("/api/v1/survey/b", post(submit_ranking_handler::<S>))
        .route("/api/v1/survey/c/next", get(next_diversity_handler::<S>))
        .route("/api/v1/survey/c", post(submit_diversity_handler::<S>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlanQuery {
    #[serde(default)]
    rater_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RaterQuery {
    rater_id: String,
}

pub(crate) async fn plan_handler<S>(
    State(service): State<Arc<SurveyService<S>>>,
    Query(query): Query<PlanQuery>,
) -> Response
where
    S: ResponseStore + 'static,
{
    let progress = service.plan(query.rater_id);
    let payload = json!({
        "progress": progress,
        "pools": service.pool_sizes(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn next_single_handler<S>(
    State(service): State<Arc<SurveyService<S>>>,
    Query(query): Query<RaterQuery>,
) -> Response
where
    S: ResponseStore + 'static,
{
    match service.next_single(&RaterId(query.rater_id)) {
        Some(item) => (StatusCode::OK, Json(json!({ "done": false, "item": item }))).into_response(),
        None => (StatusCode::OK, Json(json!({ "done": true }))).into_response(),
    }
}

pub(crate) async fn submit_single_handler<S>(
    State(service): State<Arc<SurveyService<S>>>,
    Json(record): Json<SingleRating>,
) -> Response
where
    S: ResponseStore + 'static,
{
    submission_response(service.submit_single(record))
}

pub(crate) async fn next_ranking_handler<S>(
    State(service): State<Arc<SurveyService<S>>>,
    Query(query): Query<RaterQuery>,
) -> Response
where
    S: ResponseStore + 'static,
{
    match service.next_ranking(&RaterId(query.rater_id)) {
        Some(item) => (StatusCode::OK, Json(json!({ "done": false, "item": item }))).into_response(),
        None => {
            let payload = if service.pool_sizes().part_b == 0 {
                json!({
                    "done": true,
                    "message": "No matching comparison sets were found across providers. \
                                Check manifests and reload the pools.",
                })
            } else {
                json!({ "done": true })
            };
            (StatusCode::OK, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn submit_ranking_handler<S>(
    State(service): State<Arc<SurveyService<S>>>,
    Json(ballot): Json<RankingBallot>,
) -> Response
where
    S: ResponseStore + 'static,
{
    submission_response(service.submit_ranking(ballot))
}

pub(crate) async fn next_diversity_handler<S>(
    State(service): State<Arc<SurveyService<S>>>,
    Query(query): Query<RaterQuery>,
) -> Response
where
    S: ResponseStore + 'static,
{
    match service.next_diversity(&RaterId(query.rater_id)) {
        Some(item) => (StatusCode::OK, Json(json!({ "done": false, "item": item }))).into_response(),
        None => (StatusCode::OK, Json(json!({ "done": true }))).into_response(),
    }
}

pub(crate) async fn submit_diversity_handler<S>(
    State(service): State<Arc<SurveyService<S>>>,
    Json(record): Json<DiversityRating>,
) -> Response
where
    S: ResponseStore + 'static,
{
    submission_response(service.submit_diversity(record))
}

fn submission_response(result: Result<(), ServiceError>) -> Response {
    match result {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "recorded": true }))).into_response(),
        Err(ServiceError::Submission(error)) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
