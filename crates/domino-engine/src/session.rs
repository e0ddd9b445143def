//! Tick-driven sandbox session.
//!
//! A [`Session`] owns the entity registry, the undo history and the build
//! controller, and advances them one fixed step per [`Session::tick`]. The
//! host calls `tick` once per simulation step with that step's
//! [`InputFrame`]; nothing inside the session polls devices or sleeps.
//!
//! Each tick:
//!
//! 1. Due timers fire (the scroll debounce).
//! 2. The input frame is interpreted according to the current [`Mode`].
//!    In build mode the full controller runs. In spectator mode only undo
//!    is honoured.
//! 3. The tick counter advances. Simulation time is derived as
//!    `tick_count * fixed_dt` rather than accumulated.
//!
//! The history lives as long as the session. Switching modes hands it over
//! untouched; only [`Session::reset`] and [`Session::load_layout`] clear it.

use domino_core::history::ActionHistory;
use domino_core::registry::EntityRegistry;
use domino_core::CoreError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::controller::{BuildController, ControllerConfig, FrameReport};
use crate::input::InputFrame;
use crate::layout::{LayoutReport, SavedLayout};
use crate::EngineError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Session`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    /// Gesture tunables.
    pub controller: ControllerConfig,
}

impl Default for SessionConfig {
    /// Defaults to 60 Hz with default gesture tunables.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            controller: ControllerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: SessionConfig =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig {
                details: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(EngineError::InvalidConfig {
                details: format!("fixed_dt must be positive and finite, got {}", self.fixed_dt),
            });
        }
        let refresh = self.controller.scroll_refresh_secs;
        if !(refresh >= 0.0 && refresh.is_finite()) {
            return Err(EngineError::InvalidConfig {
                details: format!("scroll_refresh_secs must be non-negative and finite, got {refresh}"),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which controller is interpreting input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Place, select, move, recolor, delete.
    #[default]
    Build,
    /// Watch the physics run. Only undo is accepted.
    Spectator,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The sandbox: registry, history and controller driven by a fixed tick.
pub struct Session {
    registry: EntityRegistry,
    history: ActionHistory,
    controller: BuildController,
    mode: Mode,
    tick_counter: u64,
    config: SessionConfig,
}

impl Session {
    /// Create an empty session in build mode.
    ///
    /// # Panics
    ///
    /// Panics if the config is invalid (see [`SessionConfig::validate`]).
    pub fn new(config: SessionConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("{e}");
        }
        Self {
            registry: EntityRegistry::new(),
            history: ActionHistory::new(),
            controller: BuildController::new(&config.controller),
            mode: Mode::Build,
            tick_counter: 0,
            config,
        }
    }

    /// Execute one simulation step with `input`.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError::IndexCorruption`] from an undo. The session
    /// should be [`reset`](Self::reset) after that.
    pub fn tick(&mut self, input: &InputFrame) -> Result<FrameReport, CoreError> {
        let now = self.sim_time();
        let report = match self.mode {
            Mode::Build => {
                self.controller
                    .tick(input, now, &mut self.registry, &mut self.history)?
            }
            Mode::Spectator => {
                self.controller.poll_timers(now);
                let mut report = FrameReport::default();
                if input.undo_pressed {
                    report.undo = Some(self.controller.undo(&mut self.registry, &mut self.history)?);
                }
                report
            }
        };
        self.tick_counter += 1;
        Ok(report)
    }

    /// Run `count` idle ticks.
    pub fn run_idle(&mut self, count: u64) -> Result<(), CoreError> {
        let idle = InputFrame::idle();
        for _ in 0..count {
            self.tick(&idle)?;
        }
        Ok(())
    }

    /// Switch modes. Leaving build mode drops the drag and the selection;
    /// the history carries over unchanged.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        if self.mode == Mode::Build {
            self.controller.suspend(&mut self.registry);
        }
        info!(from = ?self.mode, to = ?mode, history = self.history.len(), "mode switch");
        self.mode = mode;
    }

    /// Reset boundary: forget the history, drop drag and selection. Entities
    /// stay where they are.
    pub fn reset(&mut self) {
        self.controller.suspend(&mut self.registry);
        self.history.clear();
        info!(entities = self.registry.len(), "session reset");
    }

    /// Capture the current layout.
    pub fn capture_layout(&self) -> SavedLayout {
        SavedLayout::capture(&self.registry)
    }

    /// Restore a saved layout onto the live entities. This is a reset
    /// boundary: the history is cleared first.
    pub fn load_layout(&mut self, layout: &SavedLayout) -> LayoutReport {
        self.reset();
        let report = layout.apply_to(&mut self.registry);
        debug!(restored = report.restored, "layout loaded");
        report
    }

    // -- accessors ----------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The number of ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulation time in seconds, computed as `tick_count * fixed_dt`.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.config.fixed_dt
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Mutable registry access for host-side setup (initial scene, physics
    /// velocity write-back). Edits made here are not recorded.
    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    pub fn controller(&self) -> &BuildController {
        &self.controller
    }

    /// Registry, history and controller borrowed together, for hosts that
    /// drive controller operations directly instead of through input frames.
    pub fn parts_mut(&mut self) -> (&mut BuildController, &mut EntityRegistry, &mut ActionHistory) {
        (&mut self.controller, &mut self.registry, &mut self.history)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
