//! Per-tick input handed to the build controller by the host.
//!
//! The core never polls devices or casts rays. The host samples its input
//! devices, runs the hit test and surface projection through its physics
//! collaborator, and passes the results in as one [`InputFrame`] per tick.
//! Frames are plain serializable data so sessions can be recorded and
//! replayed in tests.

use domino_core::entity::EntityId;
use domino_core::snapshot::Color;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ScreenRect
// ---------------------------------------------------------------------------

/// Screen-space rectangle spanned by a drag, in pixels.
///
/// The corners may be given in any order; containment is computed on the
/// normalised rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub start: Vec2,
    pub end: Vec2,
}

impl ScreenRect {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    pub fn min(&self) -> Vec2 {
        self.start.min(self.end)
    }

    pub fn max(&self) -> Vec2 {
        self.start.max(self.end)
    }

    /// Whether `point` lies inside or on the edge of the rectangle.
    pub fn contains(&self, point: Vec2) -> bool {
        let (min, max) = (self.min(), self.max());
        point.cmpge(min).all() && point.cmple(max).all()
    }
}

// ---------------------------------------------------------------------------
// RectSelection
// ---------------------------------------------------------------------------

/// A completed rectangle drag together with the screen projection of every
/// entity the host considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectSelection {
    pub rect: ScreenRect,
    pub projections: Vec<(EntityId, Vec2)>,
}

// ---------------------------------------------------------------------------
// InputFrame
// ---------------------------------------------------------------------------

/// Everything the build controller needs to know about one tick of input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputFrame {
    /// Entity under the pointer, from the host's hit test.
    pub hit: Option<EntityId>,
    /// Pointer projected onto the build surface.
    pub surface_point: Option<Vec3>,
    /// Select button went down this tick: toggle selection of `hit`.
    pub select_pressed: bool,
    /// Pickup button went down this tick: start dragging `hit`.
    pub pickup_pressed: bool,
    /// Pickup button went up this tick.
    pub pickup_released: bool,
    /// Scroll wheel movement this tick; non-zero rotates the selection.
    pub scroll_delta: f32,
    pub clear_selection: bool,
    /// Completed rectangle selection, if any.
    pub rect_select: Option<RectSelection>,
    /// Recolor the selection.
    pub recolor: Option<Color>,
    /// Spawn a domino of this color at `surface_point`.
    pub spawn: Option<Color>,
    pub delete_pressed: bool,
    pub undo_pressed: bool,
}

impl InputFrame {
    /// A frame with no input at all.
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn scroll(delta: f32) -> Self {
        Self {
            scroll_delta: delta,
            ..Self::default()
        }
    }

    pub fn undo() -> Self {
        Self {
            undo_pressed: true,
            ..Self::default()
        }
    }

    pub fn select(target: EntityId) -> Self {
        Self {
            hit: Some(target),
            select_pressed: true,
            ..Self::default()
        }
    }
}
