use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use super::domain::{DiversityRating, RankingBallot, SingleRating, SubmissionError};
use super::store::{ResponseStore, StoreError};
use crate::config::ModuleItems;
use crate::interaction::LockMode;
use crate::manifest::{encode_image_token, split_prompt, ManifestRow};
use crate::pools::{PoolSizes, SetKey, TaskPools};
use crate::session::{PlanProgress, RaterId, SessionRegistry};

/// Service composing the session registry, task pools, and response store.
/// HTTP handlers and the CLI demo both drive the survey through this type.
pub struct SurveyService<S> {
    store: Arc<S>,
    sessions: Arc<SessionRegistry>,
    pools: Mutex<TaskPools>,
    items: ModuleItems,
    lock_mode: LockMode,
}

impl<S> SurveyService<S>
where
    S: ResponseStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        sessions: Arc<SessionRegistry>,
        pools: TaskPools,
        items: ModuleItems,
    ) -> Self {
        Self {
            store,
            sessions,
            pools: Mutex::new(pools),
            items,
            lock_mode: LockMode::Advisory,
        }
    }

    /// Switch the Part B board rendering to hard-locked taken pills.
    pub fn with_lock_mode(mut self, lock_mode: LockMode) -> Self {
        self.lock_mode = lock_mode;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn pool_sizes(&self) -> PoolSizes {
        self.pools.lock().expect("pools mutex poisoned").sizes()
    }

    pub fn providers(&self) -> Vec<String> {
        self.pools
            .lock()
            .expect("pools mutex poisoned")
            .providers
            .clone()
    }

    pub fn allowed_roots(&self) -> Vec<std::path::PathBuf> {
        self.pools
            .lock()
            .expect("pools mutex poisoned")
            .allowed_roots
            .clone()
    }

    /// Swap in pools rebuilt from the latest manifests.
    pub fn replace_pools(&self, pools: TaskPools) {
        let sizes = pools.sizes();
        *self.pools.lock().expect("pools mutex poisoned") = pools;
        info!(
            part_a = sizes.part_a,
            part_b = sizes.part_b,
            part_c = sizes.part_c,
            "task pools replaced"
        );
    }

    /// Register or resume a rater, minting an id when the client has none.
    pub fn plan(&self, rater_id: Option<String>) -> PlanProgress {
        let rater = match rater_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => RaterId(id),
            None => RaterId::mint(),
        };
        let pools = self.pools.lock().expect("pools mutex poisoned");
        self.sessions.ensure_plan(&rater, &pools, &self.items)
    }

    pub fn next_single(&self, rater: &RaterId) -> Option<SingleItemPayload> {
        let (index, total, row) = self.sessions.next_single(rater)?;
        let (prepend, core) = split_prompt(&row.prompt_text);
        Some(SingleItemPayload {
            index: index + 1,
            total,
            image_token: encode_image_token(&row.image_path),
            prompt_prepend: prepend,
            prompt_core: core.to_string(),
            item: row,
        })
    }

    pub fn submit_single(&self, mut record: SingleRating) -> Result<(), ServiceError> {
        record.validate()?;
        record.submitted_utc = now_utc();

        self.sessions.record_single(
            &RaterId(record.rater_id.clone()),
            (
                record.provider.clone(),
                record.category_id.clone(),
                record.prompt_id.clone(),
                record.seed_label,
            ),
        );
        self.store.append_single(&record)?;
        Ok(())
    }

    pub fn next_ranking(&self, rater: &RaterId) -> Option<RankingItemPayload> {
        let (index, total, key) = self.sessions.next_ranking(rater)?;
        let pools = self.pools.lock().expect("pools mutex poisoned");
        let set = pools.part_b.get(&key)?;

        // Tiles follow the configured provider order, not map order.
        let tiles: Vec<RankingTile> = pools
            .providers
            .iter()
            .filter_map(|provider| set.get(provider))
            .map(|row| RankingTile {
                provider: row.provider.clone(),
                model: row.model.clone(),
                image_token: encode_image_token(&row.image_path),
                image_path: row.image_path.to_string_lossy().into_owned(),
            })
            .collect();

        let full_text = set
            .values()
            .next()
            .map(|row| row.prompt_text.clone())
            .unwrap_or_else(|| key.prompt_id.clone());
        let (prepend, core) = split_prompt(&full_text);

        Some(RankingItemPayload {
            index: index + 1,
            total,
            key,
            providers: pools.providers.clone(),
            strict_lock: self.lock_mode == LockMode::Strict,
            prompt_prepend: prepend,
            prompt_core: core.to_string(),
            tiles,
        })
    }

    pub fn submit_ranking(&self, mut ballot: RankingBallot) -> Result<(), ServiceError> {
        ballot
            .validate(&self.providers())
            .map_err(SubmissionError::from)?;
        ballot.submitted_utc = now_utc();

        self.sessions.record_ranking(
            &RaterId(ballot.rater_id.clone()),
            SetKey {
                category_id: ballot.category_id.clone(),
                prompt_id: ballot.prompt_id.clone(),
                seed_label: ballot.seed_label,
            },
        );
        self.store.append_ranking(&ballot)?;
        Ok(())
    }

    pub fn next_diversity(&self, rater: &RaterId) -> Option<DiversityItemPayload> {
        let (index, total, grid) = self.sessions.next_diversity(rater)?;
        let full_text = grid
            .rows
            .first()
            .map(|row| row.prompt_text.clone())
            .unwrap_or_else(|| grid.prompt_id.clone());
        let (prepend, core) = split_prompt(&full_text);

        let variants = grid
            .rows
            .iter()
            .map(|row| DiversityVariant {
                seed_label: row.seed_label,
                image_token: encode_image_token(&row.image_path),
                image_path: row.image_path.to_string_lossy().into_owned(),
            })
            .collect();

        Some(DiversityItemPayload {
            index: index + 1,
            total,
            provider: grid.provider,
            category_id: grid.category_id,
            prompt_id: grid.prompt_id,
            prompt_prepend: prepend,
            prompt_core: core.to_string(),
            variants,
        })
    }

    pub fn submit_diversity(&self, mut record: DiversityRating) -> Result<(), ServiceError> {
        record.validate()?;
        record.submitted_utc = now_utc();

        self.sessions.record_diversity(
            &RaterId(record.rater_id.clone()),
            (
                record.provider.clone(),
                record.category_id.clone(),
                record.prompt_id.clone(),
            ),
        );
        self.store.append_diversity(&record)?;
        Ok(())
    }
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Next Part A item for a rater.
#[derive(Debug, Clone, Serialize)]
pub struct SingleItemPayload {
    pub index: usize,
    pub total: usize,
    pub item: ManifestRow,
    pub image_token: String,
    pub prompt_prepend: &'static str,
    pub prompt_core: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingTile {
    pub provider: String,
    pub model: String,
    pub image_token: String,
    pub image_path: String,
}

/// Next Part B comparison set for a rater.
#[derive(Debug, Clone, Serialize)]
pub struct RankingItemPayload {
    pub index: usize,
    pub total: usize,
    pub key: SetKey,
    pub providers: Vec<String>,
    /// Whether the board should hard-lock taken rank pills.
    pub strict_lock: bool,
    pub prompt_prepend: &'static str,
    pub prompt_core: String,
    pub tiles: Vec<RankingTile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiversityVariant {
    pub seed_label: u32,
    pub image_token: String,
    pub image_path: String,
}

/// Next Part C grid for a rater.
#[derive(Debug, Clone, Serialize)]
pub struct DiversityItemPayload {
    pub index: usize,
    pub total: usize,
    pub provider: String,
    pub category_id: String,
    pub prompt_id: String,
    pub prompt_prepend: &'static str,
    pub prompt_core: String,
    pub variants: Vec<DiversityVariant>,
}

/// Error raised by the survey service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
