use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use anim_survey::config::SurveyConfig;
use anim_survey::responses::{
    DiversityRating, RankingBallot, ResponseStore, SingleRating, StoreError, SurveyService,
};
use axum::http::HeaderMap;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Shared context for the admin and image endpoints.
pub(crate) struct AdminContext<S> {
    pub(crate) service: Arc<SurveyService<S>>,
    pub(crate) survey: Arc<SurveyConfig>,
    pub(crate) export_dir: PathBuf,
    pub(crate) admin_token: Option<String>,
}

impl<S> Clone for AdminContext<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            survey: self.survey.clone(),
            export_dir: self.export_dir.clone(),
            admin_token: self.admin_token.clone(),
        }
    }
}

pub(crate) const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// The admin surface is enabled only when a token is configured, and every
/// request must present it.
pub(crate) fn admin_authorized(headers: &HeaderMap, expected: &Option<String>) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|presented| presented == expected)
        .unwrap_or(false)
}

/// Mutex-backed store for tests and demo runs.
#[derive(Default)]
pub(crate) struct InMemoryResponseStore {
    singles: Mutex<Vec<SingleRating>>,
    rankings: Mutex<Vec<RankingBallot>>,
    diversities: Mutex<Vec<DiversityRating>>,
}

impl ResponseStore for InMemoryResponseStore {
    fn append_single(&self, record: &SingleRating) -> Result<(), StoreError> {
        self.singles
            .lock()
            .expect("store mutex poisoned")
            .push(record.clone());
        Ok(())
    }

    fn append_ranking(&self, record: &RankingBallot) -> Result<(), StoreError> {
        self.rankings
            .lock()
            .expect("store mutex poisoned")
            .push(record.clone());
        Ok(())
    }

    fn append_diversity(&self, record: &DiversityRating) -> Result<(), StoreError> {
        self.diversities
            .lock()
            .expect("store mutex poisoned")
            .push(record.clone());
        Ok(())
    }

    fn singles(&self) -> Result<Vec<SingleRating>, StoreError> {
        Ok(self.singles.lock().expect("store mutex poisoned").clone())
    }

    fn rankings(&self) -> Result<Vec<RankingBallot>, StoreError> {
        Ok(self.rankings.lock().expect("store mutex poisoned").clone())
    }

    fn diversities(&self) -> Result<Vec<DiversityRating>, StoreError> {
        Ok(self
            .diversities
            .lock()
            .expect("store mutex poisoned")
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn admin_disabled_without_configured_token() {
        let headers = HeaderMap::new();
        assert!(!admin_authorized(&headers, &None));

        let mut with_header = HeaderMap::new();
        with_header.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("secret"));
        assert!(!admin_authorized(&with_header, &None));
    }

    #[test]
    fn admin_requires_matching_token() {
        let expected = Some("secret".to_string());

        let mut headers = HeaderMap::new();
        assert!(!admin_authorized(&headers, &expected));

        headers.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("wrong"));
        assert!(!admin_authorized(&headers, &expected));

        headers.insert(ADMIN_TOKEN_HEADER, HeaderValue::from_static("secret"));
        assert!(admin_authorized(&headers, &expected));
    }
}
