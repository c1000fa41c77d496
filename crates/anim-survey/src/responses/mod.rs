//! Response intake: domain records, validation, persistence, and the
//! participant-facing HTTP surface.

pub mod domain;
pub mod router;
pub mod service;
pub mod store;

pub use domain::{
    BallotError, DiversityRating, RankingBallot, SingleRating, SubmissionError, TextCorrectness,
    SCORE_MAX, SCORE_MIN,
};
pub use router::survey_router;
pub use service::{
    DiversityItemPayload, DiversityVariant, RankingItemPayload, RankingTile, ServiceError,
    SingleItemPayload, SurveyService,
};
pub use store::{CsvResponseStore, ResponseStore, StoreError};
