use serde::Serialize;

use super::ranking::{RankBoard, RANK_COUNT};

/// How taken rank pills behave in the rendered board.
///
/// `Advisory` keeps every pill clickable and marks taken ranks visually,
/// so a rater can fix an ordering with a single click. `Strict` locks taken
/// pills for studies that want explicit unassignment first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    #[default]
    Advisory,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PillState {
    /// No provider holds this rank.
    Open,
    /// This card's provider holds this rank.
    Active,
    /// Another provider holds this rank.
    Taken,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankPillView {
    pub rank: u8,
    pub state: PillState,
    pub clickable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderCardView {
    pub provider: String,
    /// Form-control key for this card, `rank_<provider>`.
    pub control: String,
    pub assigned_rank: Option<u8>,
    pub pills: Vec<RankPillView>,
}

/// Derived, read-only state of the whole board: one card per provider plus
/// the progress caption and submit gate. Recomputed in full after every pick.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub cards: Vec<ProviderCardView>,
    pub chosen_count: usize,
    pub progress_line: String,
    pub submit_enabled: bool,
}

pub fn progress_line(board: &RankBoard) -> String {
    format!(
        "Chosen {}/{} ranks (no ties).",
        board.chosen_count(),
        RANK_COUNT
    )
}

/// Submit is available exactly when the assignment is a total bijection.
pub fn submit_enabled(board: &RankBoard) -> bool {
    board.is_complete()
}

/// Project the board into renderable state. Pure: projecting twice without
/// an intervening pick yields the same view.
pub fn project(board: &RankBoard, mode: LockMode) -> BoardView {
    let cards = board
        .providers()
        .iter()
        .map(|provider| {
            let assigned_rank = board.rank_of(provider);
            let pills = (1..=RANK_COUNT)
                .map(|rank| {
                    let state = if assigned_rank == Some(rank) {
                        PillState::Active
                    } else if board.holder_of(rank).is_some() {
                        PillState::Taken
                    } else {
                        PillState::Open
                    };
                    let clickable = !(mode == LockMode::Strict && state == PillState::Taken);
                    RankPillView {
                        rank,
                        state,
                        clickable,
                    }
                })
                .collect();

            ProviderCardView {
                provider: provider.clone(),
                control: format!("rank_{provider}"),
                assigned_rank,
                pills,
            }
        })
        .collect();

    BoardView {
        cards,
        chosen_count: board.chosen_count(),
        progress_line: progress_line(board),
        submit_enabled: submit_enabled(board),
    }
}
