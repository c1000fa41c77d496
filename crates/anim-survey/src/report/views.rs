use serde::Serialize;

use crate::pools::PoolSizes;

/// Mean opinion scores for one provider across the Part A scales.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MosRow {
    pub provider: String,
    pub n: usize,
    pub adherence: f64,
    pub aesthetic: f64,
    pub creativity: f64,
    pub style: f64,
}

/// Text-correctness tallies for prompts that requested on-image text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextCorrectnessRow {
    pub provider: String,
    pub correct: usize,
    pub partial: usize,
    pub incorrect: usize,
}

/// No-people compliance: how often a provider drew people anyway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeopleComplianceRow {
    pub provider: String,
    pub with_rule: usize,
    pub violations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_rate_pct: Option<f64>,
}

/// Part B standing for one provider; lower average rank is better.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub provider: String,
    pub n: usize,
    pub avg_rank: f64,
    pub wins: usize,
}

/// Part C diversity average for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiversityRow {
    pub provider: String,
    pub n: usize,
    pub avg_diversity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub raters: usize,
    pub part_a: usize,
    pub part_b: usize,
    pub part_c: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentSingle {
    pub submitted_utc: String,
    pub rater_id: String,
    pub provider: String,
    pub category_id: String,
    pub prompt_id: String,
    pub seed_label: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentRanking {
    pub submitted_utc: String,
    pub rater_id: String,
    pub category_id: String,
    pub prompt_id: String,
    pub seed_label: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentDiversity {
    pub submitted_utc: String,
    pub rater_id: String,
    pub provider: String,
    pub category_id: String,
    pub prompt_id: String,
    pub diversity: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentSubmissions {
    pub part_a: Vec<RecentSingle>,
    pub part_b: Vec<RecentRanking>,
    pub part_c: Vec<RecentDiversity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartASection {
    pub mos: Vec<MosRow>,
    pub text: Vec<TextCorrectnessRow>,
    pub people: Vec<PeopleComplianceRow>,
}

/// Aggregate study dashboard payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyReport {
    pub totals: ReportTotals,
    pub pools: PoolSizes,
    pub part_a: PartASection,
    pub part_b: Vec<RankingRow>,
    pub part_c: Vec<DiversityRow>,
    pub recent: RecentSubmissions,
}
