//! In-page rating behaviors, modeled as commands over explicit state with
//! pure view projections so they can be exercised without a browser.

mod gate;
mod panels;
mod ranking;
mod timing;

pub use gate::{
    project, progress_line, submit_enabled, BoardView, LockMode, PillState, ProviderCardView,
    RankPillView,
};
pub use panels::{
    DismissAction, InMemoryVisibilityStore, InstructionPanel, InstructionPanelView, PrependToggle,
    Rect, SliderEcho, VisibilityStore, ZoomDialog, INSTRUCTIONS_HIDDEN_KEY,
};
pub use ranking::{RankBoard, RANK_COUNT};
pub use timing::SubmitTimer;
