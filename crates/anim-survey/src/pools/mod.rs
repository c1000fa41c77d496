use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SurveyConfig;
use crate::manifest::{ManifestImportError, ManifestImporter, ManifestRow};

/// Identity of a Part B comparison set: one prompt rendered by every
/// provider with the same seed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SetKey {
    pub category_id: String,
    pub prompt_id: String,
    pub seed_label: u32,
}

/// Identity and rows of a Part C diversity grid: one provider, one prompt,
/// every configured seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiversityGrid {
    pub provider: String,
    pub category_id: String,
    pub prompt_id: String,
    pub rows: Vec<ManifestRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSizes {
    pub part_a: usize,
    pub part_b: usize,
    pub part_c: usize,
}

/// The rateable item pools, rebuilt from manifests on startup and on demand.
#[derive(Debug, Clone, Default)]
pub struct TaskPools {
    pub providers: Vec<String>,
    pub part_a: Vec<ManifestRow>,
    pub part_b: BTreeMap<SetKey, BTreeMap<String, ManifestRow>>,
    pub part_c: Vec<DiversityGrid>,
    pub allowed_roots: Vec<PathBuf>,
}

impl TaskPools {
    /// Read the latest manifest of every configured provider and assemble
    /// the pools.
    pub fn load(config: &SurveyConfig) -> Result<Self, ManifestImportError> {
        let mut rows_by_provider = Vec::with_capacity(config.providers.len());
        let mut roots = Vec::with_capacity(config.providers.len());
        for provider in &config.providers {
            let rows =
                ManifestImporter::load_provider(&provider.name, &provider.root, &config.filter)?;
            info!(provider = %provider.name, rows = rows.len(), "loaded manifest");
            roots.push(provider.root.clone());
            rows_by_provider.push((provider.name.clone(), rows));
        }

        Ok(Self::build(rows_by_provider, roots, &config.seed_labels))
    }

    /// Assemble pools from already-parsed rows.
    pub fn build(
        rows_by_provider: Vec<(String, Vec<ManifestRow>)>,
        allowed_roots: Vec<PathBuf>,
        seed_labels: &[u32],
    ) -> Self {
        let providers: Vec<String> = rows_by_provider
            .iter()
            .map(|(name, _)| name.clone())
            .collect();

        let part_a: Vec<ManifestRow> = rows_by_provider
            .iter()
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect();

        // Part B: index each provider by set key, keeping the most recently
        // completed row, then intersect keys across all providers.
        let mut indexed: Vec<(String, BTreeMap<SetKey, ManifestRow>)> = Vec::new();
        for (provider, rows) in &rows_by_provider {
            let mut index: BTreeMap<SetKey, ManifestRow> = BTreeMap::new();
            for row in rows {
                let key = SetKey {
                    category_id: row.category_id.clone(),
                    prompt_id: row.prompt_id.clone(),
                    seed_label: row.seed_label,
                };
                match index.get(&key) {
                    Some(kept) if kept.completed_utc >= row.completed_utc => {}
                    _ => {
                        index.insert(key, row.clone());
                    }
                }
            }
            indexed.push((provider.clone(), index));
        }

        let mut part_b: BTreeMap<SetKey, BTreeMap<String, ManifestRow>> = BTreeMap::new();
        if let Some((_, first)) = indexed.first() {
            'keys: for key in first.keys() {
                let mut set = BTreeMap::new();
                for (provider, index) in &indexed {
                    match index.get(key) {
                        Some(row) => {
                            set.insert(provider.clone(), row.clone());
                        }
                        None => continue 'keys,
                    }
                }
                part_b.insert(key.clone(), set);
            }
        }

        // Part C: per provider and prompt, require a row for every seed.
        let mut part_c = Vec::new();
        for (provider, rows) in &rows_by_provider {
            let mut grouped: BTreeMap<(String, String), BTreeMap<u32, ManifestRow>> =
                BTreeMap::new();
            for row in rows {
                grouped
                    .entry((row.category_id.clone(), row.prompt_id.clone()))
                    .or_default()
                    .insert(row.seed_label, row.clone());
            }
            for ((category_id, prompt_id), by_seed) in grouped {
                if seed_labels.iter().all(|seed| by_seed.contains_key(seed)) {
                    part_c.push(DiversityGrid {
                        provider: provider.clone(),
                        category_id,
                        prompt_id,
                        rows: seed_labels
                            .iter()
                            .map(|seed| by_seed[seed].clone())
                            .collect(),
                    });
                }
            }
        }

        Self {
            providers,
            part_a,
            part_b,
            part_c,
            allowed_roots,
        }
    }

    pub fn sizes(&self) -> PoolSizes {
        PoolSizes {
            part_a: self.part_a.len(),
            part_b: self.part_b.len(),
            part_c: self.part_c.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn row(provider: &str, prompt: &str, seed: u32, completed: &str) -> ManifestRow {
        ManifestRow {
            provider: provider.to_string(),
            model: format!("{provider}-model"),
            run_id: "run-01".to_string(),
            category_id: "animals".to_string(),
            prompt_id: prompt.to_string(),
            seed_label: seed,
            image_path: Path::new("/data")
                .join(provider)
                .join(format!("{prompt}_{seed}.png")),
            prompt_text: format!("prompt {prompt}"),
            has_text: false,
            expected_texts: String::new(),
            no_people: false,
            status: "ok".to_string(),
            width: Some(1024),
            height: Some(1024),
            completed_utc: completed.to_string(),
        }
    }

    #[test]
    fn part_b_requires_every_provider() {
        let pools = TaskPools::build(
            vec![
                (
                    "chatgpt".to_string(),
                    vec![row("chatgpt", "p01", 11, "t1"), row("chatgpt", "p02", 11, "t1")],
                ),
                ("google".to_string(), vec![row("google", "p01", 11, "t1")]),
            ],
            Vec::new(),
            &[11],
        );

        assert_eq!(pools.part_b.len(), 1);
        let key = SetKey {
            category_id: "animals".to_string(),
            prompt_id: "p01".to_string(),
            seed_label: 11,
        };
        assert_eq!(pools.part_b[&key].len(), 2);
        assert_eq!(pools.part_a.len(), 3);
    }

    #[test]
    fn part_b_keeps_latest_completion_per_key() {
        let pools = TaskPools::build(
            vec![(
                "chatgpt".to_string(),
                vec![
                    row("chatgpt", "p01", 11, "2025-07-01T08:00:00Z"),
                    row("chatgpt", "p01", 11, "2025-07-02T08:00:00Z"),
                ],
            )],
            Vec::new(),
            &[11],
        );

        let key = SetKey {
            category_id: "animals".to_string(),
            prompt_id: "p01".to_string(),
            seed_label: 11,
        };
        assert_eq!(
            pools.part_b[&key]["chatgpt"].completed_utc,
            "2025-07-02T08:00:00Z"
        );
    }

    #[test]
    fn part_c_requires_every_seed() {
        let complete: Vec<ManifestRow> = [11, 23, 37]
            .into_iter()
            .map(|seed| row("chatgpt", "p01", seed, "t1"))
            .collect();
        let incomplete = vec![row("chatgpt", "p02", 11, "t1"), row("chatgpt", "p02", 23, "t1")];

        let pools = TaskPools::build(
            vec![(
                "chatgpt".to_string(),
                complete.into_iter().chain(incomplete).collect(),
            )],
            Vec::new(),
            &[11, 23, 37],
        );

        assert_eq!(pools.part_c.len(), 1);
        let grid = &pools.part_c[0];
        assert_eq!(grid.prompt_id, "p01");
        assert_eq!(
            grid.rows.iter().map(|r| r.seed_label).collect::<Vec<_>>(),
            vec![11, 23, 37]
        );
    }

    #[test]
    fn empty_providers_build_empty_pools() {
        let pools = TaskPools::build(Vec::new(), Vec::new(), &[11]);
        assert!(pools.part_a.is_empty());
        assert!(pools.part_b.is_empty());
        assert!(pools.part_c.is_empty());
    }
}
