//! Value types captured by undo actions.
//!
//! A [`Snapshot`] is the `{transform, color}` pair of one entity at one
//! instant. Snapshots have no link back to the live entity; they are plain
//! `Copy` values owned by whichever action captured them.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Position, rotation and scale of a placeable entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World-space position.
    pub position: Vec3,
    /// Orientation as a unit quaternion.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// Identity transform placed at `position`.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Same transform with `rotation` replaced.
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Rotate about the world Y axis by `degrees`, keeping the rotation
    /// normalised so repeated gesture ticks don't drift.
    pub fn rotated_about_y(mut self, degrees: f32) -> Self {
        self.rotation = (Quat::from_rotation_y(degrees.to_radians()) * self.rotation).normalize();
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// Linear RGB color, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const YELLOW: Color = Color::rgb(1.0, 0.92, 0.016);

    /// Build a color from its components.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Captured `{transform, color}` of one entity.
///
/// This is also the record shape of a persisted layout: a saved layout is an
/// ordered list of snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub transform: Transform,
    pub color: Color,
}

impl Snapshot {
    pub fn new(transform: Transform, color: Color) -> Self {
        Self { transform, color }
    }
}
