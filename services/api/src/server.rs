use std::sync::atomic::Ordering;
use std::sync::Arc;

use anim_survey::config::AppConfig;
use anim_survey::error::AppError;
use anim_survey::pools::TaskPools;
use anim_survey::responses::{CsvResponseStore, SurveyService};
use anim_survey::session::SessionRegistry;
use anim_survey::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::{AdminContext, AppState};
use crate::routes::with_service_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let pools = TaskPools::load(&config.survey)?;
    let sizes = pools.sizes();
    info!(
        part_a = sizes.part_a,
        part_b = sizes.part_b,
        part_c = sizes.part_c,
        "task pools ready"
    );

    let storage_root = config.survey.storage.resolve_root()?;
    info!(root = %storage_root.display(), "responses stored as CSV");
    let store = Arc::new(CsvResponseStore::new(&storage_root)?);
    let sessions = Arc::new(SessionRegistry::new());
    let service = Arc::new(SurveyService::new(
        store,
        sessions,
        pools,
        config.survey.module_items,
    ));

    let context = AdminContext {
        service: service.clone(),
        survey: Arc::new(config.survey.clone()),
        export_dir: storage_root.join("exports"),
        admin_token: config.admin_token.clone(),
    };
    if context.admin_token.is_none() {
        info!("no admin token configured; admin endpoints disabled");
    }

    let app = with_service_routes(service, context)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "image survey service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
