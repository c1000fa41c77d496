//! Aggregation of stored responses into the study dashboard payload.

pub mod views;

pub use views::{
    DiversityRow, MosRow, PartASection, PeopleComplianceRow, RankingRow, RecentDiversity,
    RecentRanking, RecentSingle, RecentSubmissions, ReportTotals, SurveyReport,
    TextCorrectnessRow,
};

use std::collections::BTreeMap;

use crate::pools::PoolSizes;
use crate::responses::{ResponseStore, StoreError, TextCorrectness};

const RECENT_LIMIT: usize = 10;

impl SurveyReport {
    /// Aggregate every stored response. `rater_count` comes from the session
    /// registry so raters who registered but have not submitted still count.
    pub fn build<S: ResponseStore + ?Sized>(
        store: &S,
        pools: PoolSizes,
        rater_count: usize,
    ) -> Result<Self, StoreError> {
        let singles = store.singles()?;
        let rankings = store.rankings()?;
        let diversities = store.diversities()?;

        let totals = ReportTotals {
            raters: rater_count,
            part_a: singles.len(),
            part_b: rankings.len(),
            part_c: diversities.len(),
        };

        // Part A: per-provider score sums plus the gated-check tallies.
        #[derive(Default)]
        struct SingleAccumulator {
            n: usize,
            adherence: u64,
            aesthetic: u64,
            creativity: u64,
            style: u64,
            correct: usize,
            partial: usize,
            incorrect: usize,
            with_rule: usize,
            violations: usize,
        }

        let mut by_provider: BTreeMap<String, SingleAccumulator> = BTreeMap::new();
        for record in &singles {
            let acc = by_provider.entry(record.provider.clone()).or_default();
            acc.n += 1;
            acc.adherence += u64::from(record.adherence);
            acc.aesthetic += u64::from(record.aesthetic);
            acc.creativity += u64::from(record.creativity);
            acc.style += u64::from(record.style);
            match record.text_correctness {
                TextCorrectness::Correct => acc.correct += 1,
                TextCorrectness::Partial => acc.partial += 1,
                TextCorrectness::Incorrect => acc.incorrect += 1,
                TextCorrectness::NotApplicable => {}
            }
            if record.no_people {
                acc.with_rule += 1;
                if record.people_violation {
                    acc.violations += 1;
                }
            }
        }

        let mut mos = Vec::new();
        let mut text = Vec::new();
        let mut people = Vec::new();
        for (provider, acc) in &by_provider {
            mos.push(MosRow {
                provider: provider.clone(),
                n: acc.n,
                adherence: mean(acc.adherence, acc.n),
                aesthetic: mean(acc.aesthetic, acc.n),
                creativity: mean(acc.creativity, acc.n),
                style: mean(acc.style, acc.n),
            });
            if acc.correct + acc.partial + acc.incorrect > 0 {
                text.push(TextCorrectnessRow {
                    provider: provider.clone(),
                    correct: acc.correct,
                    partial: acc.partial,
                    incorrect: acc.incorrect,
                });
            }
            people.push(PeopleComplianceRow {
                provider: provider.clone(),
                with_rule: acc.with_rule,
                violations: acc.violations,
                violation_rate_pct: (acc.with_rule > 0).then(|| {
                    round1(100.0 * acc.violations as f64 / acc.with_rule as f64)
                }),
            });
        }

        // Part B: average rank and #1 wins per provider.
        let mut rank_sums: BTreeMap<String, (u64, usize, usize)> = BTreeMap::new();
        for ballot in &rankings {
            for (provider, rank) in &ballot.ranks {
                let entry = rank_sums.entry(provider.clone()).or_default();
                entry.0 += u64::from(*rank);
                entry.1 += 1;
                if *rank == 1 {
                    entry.2 += 1;
                }
            }
        }
        let part_b = rank_sums
            .into_iter()
            .map(|(provider, (sum, n, wins))| RankingRow {
                provider,
                n,
                avg_rank: mean(sum, n),
                wins,
            })
            .collect();

        // Part C: average diversity per provider.
        let mut diversity_sums: BTreeMap<String, (u64, usize)> = BTreeMap::new();
        for record in &diversities {
            let entry = diversity_sums.entry(record.provider.clone()).or_default();
            entry.0 += u64::from(record.diversity);
            entry.1 += 1;
        }
        let part_c = diversity_sums
            .into_iter()
            .map(|(provider, (sum, n))| DiversityRow {
                provider,
                n,
                avg_diversity: mean(sum, n),
            })
            .collect();

        let recent = RecentSubmissions {
            part_a: singles
                .iter()
                .rev()
                .take(RECENT_LIMIT)
                .map(|record| RecentSingle {
                    submitted_utc: record.submitted_utc.clone(),
                    rater_id: record.rater_id.clone(),
                    provider: record.provider.clone(),
                    category_id: record.category_id.clone(),
                    prompt_id: record.prompt_id.clone(),
                    seed_label: record.seed_label,
                })
                .collect(),
            part_b: rankings
                .iter()
                .rev()
                .take(RECENT_LIMIT)
                .map(|ballot| RecentRanking {
                    submitted_utc: ballot.submitted_utc.clone(),
                    rater_id: ballot.rater_id.clone(),
                    category_id: ballot.category_id.clone(),
                    prompt_id: ballot.prompt_id.clone(),
                    seed_label: ballot.seed_label,
                })
                .collect(),
            part_c: diversities
                .iter()
                .rev()
                .take(RECENT_LIMIT)
                .map(|record| RecentDiversity {
                    submitted_utc: record.submitted_utc.clone(),
                    rater_id: record.rater_id.clone(),
                    provider: record.provider.clone(),
                    category_id: record.category_id.clone(),
                    prompt_id: record.prompt_id.clone(),
                    diversity: record.diversity,
                })
                .collect(),
        };

        Ok(Self {
            totals,
            pools,
            part_a: PartASection { mos, text, people },
            part_b,
            part_c,
            recent,
        })
    }
}

fn mean(sum: u64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    round2(sum as f64 / n as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
