//! Per-card lazy-load state.
//!
//! A card's image fetch starts the first time the card scrolls into view
//! and never restarts: [`RevealGate`] answers "newly revealed" exactly
//! once.  [`ImageSlot`] then follows the fetch itself, keeping a fallback
//! aspect ratio so the card's slot height holds still until the real
//! dimensions arrive.

/// One-shot intersection latch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevealGate {
    revealed: bool,
}

impl RevealGate {
    pub fn new() -> Self { Self::default() }

    pub fn is_revealed(&self) -> bool { self.revealed }

    /// Feeds one intersection report.  Returns `true` only on the report
    /// that first reveals the card; leaving the viewport afterwards
    /// changes nothing.
    pub fn observe(&mut self, intersecting: bool) -> bool {
        match (self.revealed, intersecting) {
            (false, true) => {
                self.revealed = true;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImagePhase {
    Loading,
    Loaded { width: u32, height: u32 },
    Failed,
}

/// Lifecycle of one card image.  `Loaded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSlot {
    phase: ImagePhase,
    fallback_aspect: f32,
}

impl ImageSlot {
    /// `fallback_aspect` is height over width, used for the reserved slot
    /// until the image reports its own size.
    pub fn new(fallback_aspect: f32) -> Self {
        Self {
            phase: ImagePhase::Loading,
            fallback_aspect,
        }
    }

    pub fn phase(&self) -> ImagePhase { self.phase }

    pub fn is_settled(&self) -> bool { !matches!(self.phase, ImagePhase::Loading) }

    pub fn is_failed(&self) -> bool { matches!(self.phase, ImagePhase::Failed) }

    /// Records the decoded size.  Ignored once settled.
    pub fn loaded(&mut self, width: u32, height: u32) {
        if let ImagePhase::Loading = self.phase {
            self.phase = ImagePhase::Loaded { width, height };
        }
    }

    /// Records a fetch or decode failure.  Ignored once settled.
    pub fn failed(&mut self) {
        if let ImagePhase::Loading = self.phase {
            self.phase = ImagePhase::Failed;
        }
    }

    /// Height over width.  Real dimensions once loaded, the fallback
    /// before that and after a failure.
    pub fn aspect(&self) -> f32 {
        match self.phase {
            ImagePhase::Loaded { width, height } if width > 0 => height as f32 / width as f32,
            _ => self.fallback_aspect,
        }
    }

    pub fn reserved_height(&self, column_width: u32) -> u32 {
        let height = (column_width as f32 * self.aspect()).round() as u32;
        height.max(1)
    }
}

#[test]
fn reveal_fires_exactly_once() {
    let mut gate = RevealGate::new();

    assert!(!gate.is_revealed());
    assert!(!gate.observe(false));
    assert!(gate.observe(true));
    assert!(gate.is_revealed());

    assert!(!gate.observe(true));
    assert!(!gate.observe(false));
    assert!(gate.is_revealed());
}

#[test]
fn aspect_falls_back_until_the_image_loads() {
    let mut slot = ImageSlot::new(1.25);
    assert_eq!(slot.aspect(), 1.25);
    assert_eq!(slot.reserved_height(300), 375);

    slot.loaded(600, 900);
    assert_eq!(slot.aspect(), 1.5);
    assert_eq!(slot.reserved_height(300), 450);
}

#[test]
fn loaded_and_failed_are_terminal() {
    let mut slot = ImageSlot::new(1.0);
    slot.loaded(100, 100);
    slot.failed();
    assert_eq!(slot.phase(), ImagePhase::Loaded {
        width: 100,
        height: 100
    });

    let mut slot = ImageSlot::new(1.0);
    slot.failed();
    slot.loaded(100, 100);
    assert!(slot.is_failed());
    assert_eq!(slot.aspect(), 1.0);
}

#[test]
fn zero_width_report_keeps_the_fallback() {
    let mut slot = ImageSlot::new(0.75);
    slot.loaded(0, 480);

    assert!(slot.is_settled());
    assert_eq!(slot.aspect(), 0.75);
}
