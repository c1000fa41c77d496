use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::interaction::RANK_COUNT;

/// Rating scales run 1 (worst) through 7 (best).
pub const SCORE_MIN: u8 = 1;
pub const SCORE_MAX: u8 = 7;

/// Verdict on on-image text for prompts that requested specific text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCorrectness {
    Correct,
    Partial,
    Incorrect,
    /// The prompt did not ask for text.
    #[default]
    NotApplicable,
}

impl TextCorrectness {
    pub const fn label(self) -> &'static str {
        match self {
            TextCorrectness::Correct => "correct",
            TextCorrectness::Partial => "partial",
            TextCorrectness::Incorrect => "incorrect",
            TextCorrectness::NotApplicable => "not_applicable",
        }
    }

    pub const fn is_answered(self) -> bool {
        !matches!(self, TextCorrectness::NotApplicable)
    }
}

/// One Part A submission: four scale ratings plus the gated checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleRating {
    pub rater_id: String,
    pub provider: String,
    #[serde(default)]
    pub model: String,
    pub category_id: String,
    pub prompt_id: String,
    pub seed_label: u32,
    #[serde(default)]
    pub image_path: String,
    #[serde(default)]
    pub prompt_text: String,
    #[serde(default)]
    pub has_text: bool,
    #[serde(default)]
    pub no_people: bool,
    pub adherence: u8,
    pub aesthetic: u8,
    pub creativity: u8,
    pub style: u8,
    #[serde(default)]
    pub text_correctness: TextCorrectness,
    #[serde(default)]
    pub people_violation: bool,
    #[serde(default)]
    pub elapsed_ms: i64,
    #[serde(default)]
    pub submitted_utc: String,
}

impl SingleRating {
    pub fn validate(&self) -> Result<(), SubmissionError> {
        check_score("adherence", self.adherence)?;
        check_score("aesthetic", self.aesthetic)?;
        check_score("creativity", self.creativity)?;
        check_score("style", self.style)?;
        Ok(())
    }
}

/// One Part B submission: a full provider ranking for a comparison set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingBallot {
    pub rater_id: String,
    pub category_id: String,
    pub prompt_id: String,
    pub seed_label: u32,
    /// Provider -> rank, expected to be a 1-4 permutation.
    pub ranks: BTreeMap<String, u8>,
    /// Provider -> rated image path, for the analysis trail.
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    #[serde(default)]
    pub elapsed_ms: i64,
    #[serde(default)]
    pub submitted_utc: String,
}

impl RankingBallot {
    /// The "no ties" invariant, re-checked server-side: every provider in
    /// the comparison set ranked exactly once with a distinct rank in 1-4.
    pub fn validate(&self, providers: &[String]) -> Result<(), BallotError> {
        for provider in providers {
            if !self.ranks.contains_key(provider) {
                return Err(BallotError::MissingProvider(provider.clone()));
            }
        }

        let mut held = [false; RANK_COUNT as usize];
        for (provider, rank) in &self.ranks {
            if !providers.iter().any(|known| known == provider) {
                return Err(BallotError::UnknownProvider(provider.clone()));
            }
            if !(1..=RANK_COUNT).contains(rank) {
                return Err(BallotError::RankOutOfRange(*rank));
            }
            let slot = &mut held[(*rank - 1) as usize];
            if *slot {
                return Err(BallotError::DuplicateRank(*rank));
            }
            *slot = true;
        }

        Ok(())
    }
}

/// One Part C submission: a diversity score for a seed-variation grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiversityRating {
    pub rater_id: String,
    pub provider: String,
    pub category_id: String,
    pub prompt_id: String,
    pub diversity: u8,
    #[serde(default)]
    pub image_paths: Vec<String>,
    #[serde(default)]
    pub elapsed_ms: i64,
    #[serde(default)]
    pub submitted_utc: String,
}

impl DiversityRating {
    pub fn validate(&self) -> Result<(), SubmissionError> {
        check_score("diversity", self.diversity)
    }
}

fn check_score(field: &'static str, value: u8) -> Result<(), SubmissionError> {
    if (SCORE_MIN..=SCORE_MAX).contains(&value) {
        Ok(())
    } else {
        Err(SubmissionError::ScoreOutOfRange { field, value })
    }
}

/// Rejection reasons for Part B ballots.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BallotError {
    #[error("no rank submitted for provider '{0}'")]
    MissingProvider(String),
    #[error("rank submitted for unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("rank {0} outside 1-{RANK_COUNT}")]
    RankOutOfRange(u8),
    #[error("rank {0} assigned twice; ranks must be unique")]
    DuplicateRank(u8),
}

/// Rejection reasons common to scale submissions.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("{field} score {value} outside {SCORE_MIN}-{SCORE_MAX}")]
    ScoreOutOfRange { field: &'static str, value: u8 },
    #[error(transparent)]
    Ballot(#[from] BallotError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers() -> Vec<String> {
        ["chatgpt", "google", "stability", "bfl"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn ballot(ranks: &[(&str, u8)]) -> RankingBallot {
        RankingBallot {
            rater_id: "r1".to_string(),
            category_id: "animals".to_string(),
            prompt_id: "p01".to_string(),
            seed_label: 11,
            ranks: ranks
                .iter()
                .map(|(provider, rank)| (provider.to_string(), *rank))
                .collect(),
            images: BTreeMap::new(),
            elapsed_ms: 1200,
            submitted_utc: String::new(),
        }
    }

    #[test]
    fn permutation_ballots_pass() {
        let ballot = ballot(&[("chatgpt", 1), ("google", 2), ("stability", 3), ("bfl", 4)]);
        assert_eq!(ballot.validate(&providers()), Ok(()));
    }

    #[test]
    fn tied_ranks_are_rejected() {
        let ballot = ballot(&[("chatgpt", 1), ("google", 1), ("stability", 3), ("bfl", 4)]);
        assert_eq!(
            ballot.validate(&providers()),
            Err(BallotError::DuplicateRank(1))
        );
    }

    #[test]
    fn missing_and_unknown_providers_are_rejected() {
        let short = ballot(&[("chatgpt", 1), ("google", 2), ("stability", 3)]);
        assert_eq!(
            short.validate(&providers()),
            Err(BallotError::MissingProvider("bfl".to_string()))
        );

        let stray = ballot(&[
            ("chatgpt", 1),
            ("google", 2),
            ("stability", 3),
            ("bfl", 4),
            ("dalle", 2),
        ]);
        assert_eq!(
            stray.validate(&providers()),
            Err(BallotError::UnknownProvider("dalle".to_string()))
        );
    }

    #[test]
    fn out_of_range_ranks_are_rejected() {
        let ballot = ballot(&[("chatgpt", 0), ("google", 2), ("stability", 3), ("bfl", 4)]);
        assert_eq!(
            ballot.validate(&providers()),
            Err(BallotError::RankOutOfRange(0))
        );
    }

    #[test]
    fn scale_scores_are_bounded() {
        let mut rating = SingleRating {
            rater_id: "r1".to_string(),
            provider: "chatgpt".to_string(),
            model: String::new(),
            category_id: "animals".to_string(),
            prompt_id: "p01".to_string(),
            seed_label: 11,
            image_path: String::new(),
            prompt_text: String::new(),
            has_text: false,
            no_people: false,
            adherence: 4,
            aesthetic: 4,
            creativity: 4,
            style: 4,
            text_correctness: TextCorrectness::NotApplicable,
            people_violation: false,
            elapsed_ms: 0,
            submitted_utc: String::new(),
        };
        assert!(rating.validate().is_ok());

        rating.creativity = 8;
        assert_eq!(
            rating.validate(),
            Err(SubmissionError::ScoreOutOfRange {
                field: "creativity",
                value: 8
            })
        );
    }
}
