use std::collections::HashMap;
use std::sync::Mutex;

/// Durable-storage key for the Part A instruction panel dismissal.
pub const INSTRUCTIONS_HIDDEN_KEY: &str = "survey.instructions.hidden";

/// Durable boolean flags scoped to one rater's client. Implementations must
/// tolerate concurrent reads and writes through `&self`.
pub trait VisibilityStore: Send + Sync {
    fn read(&self, key: &str) -> bool;
    fn write(&self, key: &str, hidden: bool);
}

/// Mutex-backed store used by tests and the service binary.
#[derive(Default)]
pub struct InMemoryVisibilityStore {
    flags: Mutex<HashMap<String, bool>>,
}

impl VisibilityStore for InMemoryVisibilityStore {
    fn read(&self, key: &str) -> bool {
        *self
            .flags
            .lock()
            .expect("visibility mutex poisoned")
            .get(key)
            .unwrap_or(&false)
    }

    fn write(&self, key: &str, hidden: bool) {
        self.flags
            .lock()
            .expect("visibility mutex poisoned")
            .insert(key.to_string(), hidden);
    }
}

/// Rendered state of the instruction block: the block and its re-open
/// affordance are never visible together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionPanelView {
    pub instructions_visible: bool,
    pub reopen_visible: bool,
}

/// Collapsible instruction panel whose dismissal survives page loads.
pub struct InstructionPanel<S: VisibilityStore> {
    store: S,
}

impl<S: VisibilityStore> InstructionPanel<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn hide(&self) -> InstructionPanelView {
        self.store.write(INSTRUCTIONS_HIDDEN_KEY, true);
        self.render()
    }

    pub fn show(&self) -> InstructionPanelView {
        self.store.write(INSTRUCTIONS_HIDDEN_KEY, false);
        self.render()
    }

    /// Pure projection from the persisted flag; called on load and after
    /// every hide/show.
    pub fn render(&self) -> InstructionPanelView {
        let hidden = self.store.read(INSTRUCTIONS_HIDDEN_KEY);
        InstructionPanelView {
            instructions_visible: !hidden,
            reopen_visible: hidden,
        }
    }
}

/// Show/hide toggle for the shared prompt preamble. Purely local state.
#[derive(Debug, Default)]
pub struct PrependToggle {
    shown: bool,
}

impl PrependToggle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self) {
        self.shown = !self.shown;
    }

    pub fn shown(&self) -> bool {
        self.shown
    }

    pub fn button_label(&self) -> &'static str {
        if self.shown {
            "hide full prompt"
        } else {
            "see full prompt"
        }
    }
}

/// Mirror of a slider's numeric value into its display bubble.
#[derive(Debug, Clone, Copy)]
pub struct SliderEcho {
    value: i32,
}

impl SliderEcho {
    pub fn new(initial: i32) -> Self {
        Self { value: initial }
    }

    pub fn input(&mut self, value: i32) {
        self.value = value;
    }

    pub fn display(&self) -> String {
        self.value.to_string()
    }
}

/// Pixel-space rectangle of the zoomed image inside the dialog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// The ways a zoom dialog can be asked to close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DismissAction {
    Escape,
    CloseControl,
    BackdropClick { x: f64, y: f64 },
}

/// Lightbox dialog for a single enlarged image.
#[derive(Debug, Default)]
pub struct ZoomDialog {
    open: Option<OpenZoom>,
}

#[derive(Debug)]
struct OpenZoom {
    image_token: String,
    image_bounds: Rect,
}

impl ZoomDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, image_token: impl Into<String>, image_bounds: Rect) {
        self.open = Some(OpenZoom {
            image_token: image_token.into(),
            image_bounds,
        });
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn image_token(&self) -> Option<&str> {
        self.open.as_ref().map(|zoom| zoom.image_token.as_str())
    }

    /// Apply a dismissal trigger; returns true when the dialog closed.
    /// A backdrop click landing on the image itself is not a dismissal.
    pub fn dismiss(&mut self, action: DismissAction) -> bool {
        let Some(zoom) = &self.open else {
            return false;
        };

        let closes = match action {
            DismissAction::Escape | DismissAction::CloseControl => true,
            DismissAction::BackdropClick { x, y } => !zoom.image_bounds.contains(x, y),
        };

        if closes {
            self.open = None;
        }
        closes
    }
}
