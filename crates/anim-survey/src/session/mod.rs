use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::ModuleItems;
use crate::manifest::ManifestRow;
use crate::pools::{DiversityGrid, SetKey, TaskPools};

/// Anonymous identifier for one survey participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaterId(pub String);

impl RaterId {
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Identity of a rated Part A item.
pub type SeenSingle = (String, String, String, u32);
/// Identity of a rated Part C grid.
pub type SeenGrid = (String, String, String);

#[derive(Debug, Default)]
struct RaterSession {
    plan_a: Vec<ManifestRow>,
    plan_b: Vec<SetKey>,
    plan_c: Vec<DiversityGrid>,
    cursor_a: usize,
    cursor_b: usize,
    cursor_c: usize,
    seen_a: HashSet<SeenSingle>,
    seen_b: HashSet<SetKey>,
    seen_c: HashSet<SeenGrid>,
}

impl RaterSession {
    fn exhausted(&self) -> bool {
        self.cursor_a >= self.plan_a.len()
            && self.cursor_b >= self.plan_b.len()
            && self.cursor_c >= self.plan_c.len()
    }

    fn progress(&self, rater: &RaterId) -> PlanProgress {
        PlanProgress {
            rater_id: rater.0.clone(),
            part_a: ModuleProgress::new(self.cursor_a, self.plan_a.len()),
            part_b: ModuleProgress::new(self.cursor_b, self.plan_b.len()),
            part_c: ModuleProgress::new(self.cursor_c, self.plan_c.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModuleProgress {
    pub next_index: usize,
    pub total: usize,
}

impl ModuleProgress {
    fn new(next_index: usize, total: usize) -> Self {
        Self { next_index, total }
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.next_index)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanProgress {
    pub rater_id: String,
    pub part_a: ModuleProgress,
    pub part_b: ModuleProgress,
    pub part_c: ModuleProgress,
}

/// In-memory rater sessions: sampled plans, per-module cursors, and the
/// seen-item sets that keep resampled plans fresh. Seen state lives in RAM
/// only and is cleared on restart.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<RaterId, RaterSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rater_count(&self) -> usize {
        self.sessions.lock().expect("session mutex poisoned").len()
    }

    /// Return the rater's plan progress, sampling a plan on first contact
    /// and resampling (seen items excluded) once a plan is fully exhausted.
    pub fn ensure_plan(
        &self,
        rater: &RaterId,
        pools: &TaskPools,
        items: &ModuleItems,
    ) -> PlanProgress {
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions.entry(rater.clone()).or_default();

        let fresh = session.plan_a.is_empty() && session.plan_b.is_empty() && session.plan_c.is_empty();
        if fresh || session.exhausted() {
            sample_plan(session, pools, items);
        }

        session.progress(rater)
    }

    pub fn progress(&self, rater: &RaterId) -> Option<PlanProgress> {
        let sessions = self.sessions.lock().expect("session mutex poisoned");
        sessions.get(rater).map(|session| session.progress(rater))
    }

    pub fn next_single(&self, rater: &RaterId) -> Option<(usize, usize, ManifestRow)> {
        let sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions.get(rater)?;
        let row = session.plan_a.get(session.cursor_a)?.clone();
        Some((session.cursor_a, session.plan_a.len(), row))
    }

    pub fn next_ranking(&self, rater: &RaterId) -> Option<(usize, usize, SetKey)> {
        let sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions.get(rater)?;
        let key = session.plan_b.get(session.cursor_b)?.clone();
        Some((session.cursor_b, session.plan_b.len(), key))
    }

    pub fn next_diversity(&self, rater: &RaterId) -> Option<(usize, usize, DiversityGrid)> {
        let sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions.get(rater)?;
        let grid = session.plan_c.get(session.cursor_c)?.clone();
        Some((session.cursor_c, session.plan_c.len(), grid))
    }

    /// Record a Part A submission: mark the item seen and move the cursor.
    /// Submissions are accepted even when no plan exists (e.g. after a
    /// service restart mid-session).
    pub fn record_single(&self, rater: &RaterId, key: SeenSingle) {
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions.entry(rater.clone()).or_default();
        session.seen_a.insert(key);
        session.cursor_a += 1;
    }

    pub fn record_ranking(&self, rater: &RaterId, key: SetKey) {
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions.entry(rater.clone()).or_default();
        session.seen_b.insert(key);
        session.cursor_b += 1;
    }

    pub fn record_diversity(&self, rater: &RaterId, key: SeenGrid) {
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions.entry(rater.clone()).or_default();
        session.seen_c.insert(key);
        session.cursor_c += 1;
    }

    /// Drop a rater's plan and seen sets entirely.
    pub fn clear(&self, rater: &RaterId) {
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        sessions.remove(rater);
    }
}

fn sample_plan(session: &mut RaterSession, pools: &TaskPools, items: &ModuleItems) {
    let mut rng = rand::thread_rng();

    let unseen_a: Vec<&ManifestRow> = pools
        .part_a
        .iter()
        .filter(|row| {
            !session.seen_a.contains(&(
                row.provider.clone(),
                row.category_id.clone(),
                row.prompt_id.clone(),
                row.seed_label,
            ))
        })
        .collect();
    session.plan_a = unseen_a
        .choose_multiple(&mut rng, items.a)
        .map(|row| (*row).clone())
        .collect();

    let mut unseen_b: Vec<SetKey> = pools
        .part_b
        .keys()
        .filter(|key| !session.seen_b.contains(*key))
        .cloned()
        .collect();
    unseen_b.shuffle(&mut rng);
    unseen_b.truncate(items.b);
    session.plan_b = unseen_b;

    let unseen_c: Vec<&DiversityGrid> = pools
        .part_c
        .iter()
        .filter(|grid| {
            !session.seen_c.contains(&(
                grid.provider.clone(),
                grid.category_id.clone(),
                grid.prompt_id.clone(),
            ))
        })
        .collect();
    session.plan_c = unseen_c
        .choose_multiple(&mut rng, items.c)
        .map(|grid| (*grid).clone())
        .collect();

    session.cursor_a = 0;
    session.cursor_b = 0;
    session.cursor_c = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn row(provider: &str, prompt: &str, seed: u32) -> ManifestRow {
        ManifestRow {
            provider: provider.to_string(),
            model: "m".to_string(),
            run_id: "run-01".to_string(),
            category_id: "animals".to_string(),
            prompt_id: prompt.to_string(),
            seed_label: seed,
            image_path: Path::new("/data").join(provider).join(prompt),
            prompt_text: "p".to_string(),
            has_text: false,
            expected_texts: String::new(),
            no_people: false,
            status: "ok".to_string(),
            width: None,
            height: None,
            completed_utc: "t".to_string(),
        }
    }

    fn pools() -> TaskPools {
        let providers = ["chatgpt", "google", "stability", "bfl"];
        let rows_by_provider = providers
            .iter()
            .map(|provider| {
                let rows = (0..6)
                    .map(|idx| row(provider, &format!("p{idx:02}"), 11))
                    .collect();
                (provider.to_string(), rows)
            })
            .collect();
        TaskPools::build(rows_by_provider, Vec::new(), &[11])
    }

    fn items() -> ModuleItems {
        ModuleItems { a: 4, b: 3, c: 2 }
    }

    #[test]
    fn plans_are_truncated_to_module_targets() {
        let registry = SessionRegistry::new();
        let rater = RaterId::mint();
        let progress = registry.ensure_plan(&rater, &pools(), &items());

        assert_eq!(progress.part_a.total, 4);
        assert_eq!(progress.part_b.total, 3);
        assert_eq!(progress.part_c.total, 2);
        assert_eq!(registry.rater_count(), 1);
    }

    #[test]
    fn submissions_advance_the_cursor_and_mark_seen() {
        let registry = SessionRegistry::new();
        let rater = RaterId::mint();
        registry.ensure_plan(&rater, &pools(), &items());

        let (index, total, key) = registry.next_ranking(&rater).expect("plan has sets");
        assert_eq!(index, 0);
        assert_eq!(total, 3);

        registry.record_ranking(&rater, key.clone());
        let (index, _, next) = registry.next_ranking(&rater).expect("plan continues");
        assert_eq!(index, 1);
        assert_ne!(next, key);
    }

    #[test]
    fn exhausted_plans_resample_without_seen_items() {
        let registry = SessionRegistry::new();
        let rater = RaterId::mint();
        let pools = pools();
        let items = ModuleItems { a: 0, b: 6, c: 0 };
        registry.ensure_plan(&rater, &pools, &items);

        let mut first_round = HashSet::new();
        while let Some((_, _, key)) = registry.next_ranking(&rater) {
            first_round.insert(key.clone());
            registry.record_ranking(&rater, key);
        }
        assert_eq!(first_round.len(), 6);

        // Every set was seen, so the resampled plan has nothing left.
        let progress = registry.ensure_plan(&rater, &pools, &items);
        assert_eq!(progress.part_b.total, 0);
    }

    #[test]
    fn submissions_without_a_plan_are_still_recorded() {
        let registry = SessionRegistry::new();
        let rater = RaterId::mint();
        registry.record_single(
            &rater,
            ("chatgpt".into(), "animals".into(), "p00".into(), 11),
        );
        assert_eq!(registry.rater_count(), 1);
        assert!(registry.next_single(&rater).is_none());
    }

    #[test]
    fn clear_forgets_the_rater() {
        let registry = SessionRegistry::new();
        let rater = RaterId::mint();
        registry.ensure_plan(&rater, &pools(), &items());
        registry.clear(&rater);
        assert_eq!(registry.rater_count(), 0);
        assert!(registry.progress(&rater).is_none());
    }
}
