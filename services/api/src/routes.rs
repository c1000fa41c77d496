use std::sync::Arc;

use anim_survey::manifest::{decode_image_token, is_under_allowed_roots};
use anim_survey::pools::TaskPools;
use anim_survey::report::SurveyReport;
use anim_survey::responses::{survey_router, ResponseStore, SurveyService};
use axum::extract::Query;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::infra::{admin_authorized, AdminContext, AppState};

pub(crate) fn with_service_routes<S>(
    service: Arc<SurveyService<S>>,
    context: AdminContext<S>,
) -> axum::Router
where
    S: ResponseStore + 'static,
{
    survey_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/img", axum::routing::get(image_endpoint::<S>))
        .route(
            "/api/v1/admin/report",
            axum::routing::post(admin_report_endpoint::<S>),
        )
        .route(
            "/api/v1/admin/reload",
            axum::routing::post(admin_reload_endpoint::<S>),
        )
        .route(
            "/api/v1/admin/export",
            axum::routing::post(admin_export_endpoint::<S>),
        )
        .layer(Extension(context))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageQuery {
    p: String,
}

/// Serve one image referenced by an opaque path token. Only files under the
/// configured provider roots are reachable.
pub(crate) async fn image_endpoint<S>(
    Extension(context): Extension<AdminContext<S>>,
    Query(query): Query<ImageQuery>,
) -> axum::response::Response
where
    S: ResponseStore + 'static,
{
    let Some(path) = decode_image_token(&query.p) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if !is_under_allowed_roots(&path, &context.service.allowed_roots()) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        bytes,
    )
        .into_response()
}

pub(crate) async fn admin_report_endpoint<S>(
    Extension(context): Extension<AdminContext<S>>,
    headers: HeaderMap,
) -> axum::response::Response
where
    S: ResponseStore + 'static,
{
    if !admin_authorized(&headers, &context.admin_token) {
        return unauthorized();
    }

    let report = SurveyReport::build(
        context.service.store().as_ref(),
        context.service.pool_sizes(),
        context.service.sessions().rater_count(),
    );
    match report {
        Ok(report) => (StatusCode::OK, Json(json!({ "ok": true, "data": report }))).into_response(),
        Err(error) => {
            warn!(%error, "report aggregation failed");
            let payload = json!({ "ok": false, "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn admin_reload_endpoint<S>(
    Extension(context): Extension<AdminContext<S>>,
    headers: HeaderMap,
) -> axum::response::Response
where
    S: ResponseStore + 'static,
{
    if !admin_authorized(&headers, &context.admin_token) {
        return unauthorized();
    }

    match TaskPools::load(&context.survey) {
        Ok(pools) => {
            context.service.replace_pools(pools);
            let payload = json!({
                "ok": true,
                "message": "Task pools rebuilt from latest manifests.",
                "pools": context.service.pool_sizes(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => {
            warn!(%error, "pool reload failed");
            let payload = json!({ "ok": false, "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn admin_export_endpoint<S>(
    Extension(context): Extension<AdminContext<S>>,
    headers: HeaderMap,
) -> axum::response::Response
where
    S: ResponseStore + 'static,
{
    if !admin_authorized(&headers, &context.admin_token) {
        return unauthorized();
    }

    match context.service.store().export(&context.export_dir) {
        Ok(files) => {
            let files: Vec<String> = files
                .iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect();
            (
                StatusCode::OK,
                Json(json!({ "exported": true, "files": files })),
            )
                .into_response()
        }
        Err(error) => {
            warn!(%error, "response export failed");
            let payload = json!({ "exported": false, "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

fn unauthorized() -> axum::response::Response {
    let payload = json!({ "error": "admin token missing or invalid" });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryResponseStore;
    use anim_survey::config::{ModuleItems, SurveyConfig};
    use anim_survey::manifest::encode_image_token;
    use anim_survey::session::SessionRegistry;
    use std::path::Path;

    fn context() -> AdminContext<InMemoryResponseStore> {
        let store = Arc::new(InMemoryResponseStore::default());
        let sessions = Arc::new(SessionRegistry::new());
        let service = Arc::new(SurveyService::new(
            store,
            sessions,
            TaskPools::default(),
            ModuleItems::default(),
        ));
        AdminContext {
            service,
            survey: Arc::new(SurveyConfig::default()),
            export_dir: std::env::temp_dir().join("survey-route-tests"),
            admin_token: None,
        }
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ok"));
    }

    #[tokio::test]
    async fn admin_endpoints_reject_without_token() {
        let response =
            admin_report_endpoint(Extension(context()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn image_endpoint_rejects_bad_and_foreign_paths() {
        let response = image_endpoint(
            Extension(context()),
            Query(ImageQuery {
                p: "!!not-a-token!!".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Valid token, but the path is outside every allowed root.
        let token = encode_image_token(Path::new("/etc/passwd"));
        let response = image_endpoint(Extension(context()), Query(ImageQuery { p: token })).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
