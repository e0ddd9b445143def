//! Domino core -- entity registry and undo history for the domino sandbox.
//!
//! This crate holds the engine-independent half of the build mode: a registry
//! of placeable entities keyed by generational [`EntityId`](entity::EntityId)s,
//! the four reversible [`Action`](action::Action) kinds, and the
//! [`ActionHistory`](history::ActionHistory) undo stack with its reverse index
//! from entity to the actions that reference it.
//!
//! # Quick Start
//!
//! ```
//! use domino_core::prelude::*;
//!
//! let mut registry = EntityRegistry::new();
//! let mut history = ActionHistory::new();
//!
//! let domino = registry.create(Transform::default(), Color::WHITE);
//! history.push_add([domino]);
//!
//! history.push_color(&registry, [domino]);
//! registry.set_color(domino, Color::RED).unwrap();
//!
//! assert!(history.attempt_undo(&mut registry).unwrap());
//! assert_eq!(registry.get(domino).unwrap().color, Color::WHITE);
//!
//! assert!(history.attempt_undo(&mut registry).unwrap());
//! assert!(!registry.contains(domino));
//!
//! // Nothing left to undo.
//! assert!(!history.attempt_undo(&mut registry).unwrap());
//! ```

#![deny(unsafe_code)]

pub mod action;
pub mod entity;
pub mod history;
pub mod registry;
pub mod snapshot;

use entity::EntityId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by registry and history operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The entity is not live (destroyed, or the id was never issued).
    #[error("entity {entity} is not live")]
    NotFound { entity: EntityId },

    /// The history's reverse index disagrees with its stack. This is a bug,
    /// not a recoverable condition: undo results after it are untrustworthy.
    #[error("history index corrupted while remapping {old} -> {new}: {details}")]
    IndexCorruption {
        old: EntityId,
        new: EntityId,
        details: String,
    },

    /// [`ActionHistory::verify_index`](history::ActionHistory::verify_index)
    /// found the index out of sync with the stack.
    #[error("history index out of sync with stack: {details}")]
    IndexMismatch { details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::action::{
        Action, ActionKind, AddAction, ColorAction, DeleteAction, TransformAction, UndoReport,
    };
    pub use crate::entity::EntityId;
    pub use crate::history::{ActionHistory, ActionKey};
    pub use crate::registry::{Entity, EntityRegistry, RegistryEvent};
    pub use crate::snapshot::{Color, Snapshot, Transform};
    pub use crate::CoreError;
}
