//! Domino engine -- build-mode controller and session loop for the sandbox.
//!
//! This crate builds on [`domino_core`] to provide the interactive half of
//! the build mode: a [`BuildController`](controller::BuildController) that
//! turns per-tick input into registry edits and undo steps, the scroll
//! [`DebounceTimer`](debounce::DebounceTimer), a tick-driven
//! [`Session`](session::Session) with build/spectator modes, and hashed
//! [`SavedLayout`](layout::SavedLayout)s.
//!
//! # Quick Start
//!
//! ```
//! use domino_engine::prelude::*;
//! use glam::Vec3;
//!
//! let mut session = Session::new(SessionConfig::default());
//!
//! // Spawn a domino where the pointer meets the table.
//! let report = session
//!     .tick(&InputFrame {
//!         surface_point: Some(Vec3::new(1.0, 0.0, 2.0)),
//!         spawn: Some(Color::RED),
//!         ..InputFrame::idle()
//!     })
//!     .unwrap();
//! let domino = report.spawned.unwrap();
//! assert!(session.registry().contains(domino));
//!
//! // Undo it again.
//! let report = session.tick(&InputFrame::undo()).unwrap();
//! assert_eq!(report.undo, Some(UndoOutcome::Undone));
//! assert!(session.registry().is_empty());
//! ```

#![deny(unsafe_code)]

pub mod controller;
pub mod debounce;
pub mod input;
pub mod layout;
pub mod session;

/// Re-export the core crate for convenience.
pub use domino_core;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced at the engine level.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A session config failed to parse or validate.
    #[error("invalid session config: {details}")]
    InvalidConfig { details: String },

    #[error(transparent)]
    Core(#[from] domino_core::CoreError),
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG` (default
/// `info`). Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use domino_core::prelude::*;

    pub use crate::controller::{BuildController, ControllerConfig, FrameReport, UndoOutcome};
    pub use crate::debounce::DebounceTimer;
    pub use crate::input::{InputFrame, RectSelection, ScreenRect};
    pub use crate::layout::{LayoutReport, SavedLayout};
    pub use crate::session::{Mode, Session, SessionConfig};
    pub use crate::EngineError;
}
