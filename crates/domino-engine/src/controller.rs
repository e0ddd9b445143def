//! Selection and gesture handling for the build mode.
//!
//! [`BuildController`] turns player intents into registry mutations and
//! decides which of them become undo steps:
//!
//! - Selection changes are never recorded.
//! - A drag is one undo step, recorded at pickup before the entity moves.
//!   Per-frame drag positions are written straight to the registry.
//! - A scroll-rotate burst is one undo step. The first scroll tick of a burst
//!   records the selection's transforms; every scroll tick restarts the
//!   debounce timer, and only when the timer fires does the next scroll
//!   start a new burst. Changing the selection or undoing also ends the
//!   burst.
//! - Spawn, delete and recolor are one step each.
//!
//! An unrecorded drag or scroll write is only allowed while the top of the
//! history is a transform step that restores every entity it touches.
//! Once anything else has been recorded (or the step was undone), the next
//! write records a fresh step first, so undo always reverses the most
//! recent visible change.
//!
//! The controller owns no scene state. The registry and the history are
//! passed into every call, which is what lets the session hand the same
//! history to the spectator side on a mode switch.

use std::collections::BTreeSet;

use domino_core::action::Action;
use domino_core::entity::EntityId;
use domino_core::history::ActionHistory;
use domino_core::registry::EntityRegistry;
use domino_core::snapshot::{Color, Transform};
use domino_core::CoreError;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::debounce::DebounceTimer;
use crate::input::{InputFrame, ScreenRect};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Result of an undo request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndoOutcome {
    /// The most recent action was reversed.
    Undone,
    /// The history was empty; nothing changed.
    NothingToUndo,
}

/// What one [`BuildController::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Actions pushed onto the history this tick.
    pub pushed: usize,
    /// Set when the frame requested an undo.
    pub undo: Option<UndoOutcome>,
    /// Entity spawned this tick, if any.
    pub spawned: Option<EntityId>,
}

// ---------------------------------------------------------------------------
// Drag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    entity: EntityId,
}

// ---------------------------------------------------------------------------
// BuildController
// ---------------------------------------------------------------------------

/// Tunables for [`BuildController`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Seconds without scroll input after which the next scroll starts a new
    /// undo step.
    pub scroll_refresh_secs: f64,
    /// Degrees of rotation about world Y per unit of scroll delta.
    pub rotate_degrees_per_unit: f32,
    /// Height above the surface point at which a held entity floats.
    pub hold_height: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            scroll_refresh_secs: 0.5,
            rotate_degrees_per_unit: 15.0,
            hold_height: 0.5,
        }
    }
}

/// Selection and gesture state machine for the build mode.
#[derive(Debug, Clone)]
pub struct BuildController {
    /// Selected entities in selection order, without duplicates.
    selection: Vec<EntityId>,
    drag: Option<Drag>,
    scroll_timer: DebounceTimer,
    /// Whether the next scroll tick begins a new burst (and records).
    scroll_burst_open: bool,
    rotate_degrees_per_unit: f32,
    hold_height: f32,
}

impl BuildController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            selection: Vec::new(),
            drag: None,
            scroll_timer: DebounceTimer::new(config.scroll_refresh_secs),
            scroll_burst_open: true,
            rotate_degrees_per_unit: config.rotate_degrees_per_unit,
            hold_height: config.hold_height,
        }
    }

    // -- selection ----------------------------------------------------------

    /// Add `target` to the selection. Dead ids are ignored.
    pub fn select(&mut self, registry: &mut EntityRegistry, target: EntityId) {
        if self.is_selected(target) || registry.set_selected(target, true).is_err() {
            return;
        }
        self.selection.push(target);
        self.close_scroll_burst();
        trace!(entity = %target, "selected");
    }

    /// Remove `target` from the selection.
    pub fn deselect(&mut self, registry: &mut EntityRegistry, target: EntityId) {
        let before = self.selection.len();
        self.selection.retain(|&id| id != target);
        if self.selection.len() != before {
            // The entity may already be gone; the flag went with it.
            let _ = registry.set_selected(target, false);
            self.close_scroll_burst();
            trace!(entity = %target, "deselected");
        }
    }

    /// Flip `target`'s membership in the selection.
    pub fn toggle_select(&mut self, registry: &mut EntityRegistry, target: EntityId) {
        if self.is_selected(target) {
            self.deselect(registry, target);
        } else {
            self.select(registry, target);
        }
    }

    pub fn clear_selection(&mut self, registry: &mut EntityRegistry) {
        if self.selection.is_empty() {
            return;
        }
        for id in std::mem::take(&mut self.selection) {
            let _ = registry.set_selected(id, false);
        }
        self.close_scroll_burst();
    }

    pub fn selection(&self) -> &[EntityId] {
        &self.selection
    }

    pub fn is_selected(&self, id: EntityId) -> bool {
        self.selection.contains(&id)
    }

    /// Toggle every live entity whose screen projection falls inside `rect`.
    /// An entity listed more than once is toggled once. Returns how many
    /// entities were toggled.
    pub fn mass_select(
        &mut self,
        registry: &mut EntityRegistry,
        rect: ScreenRect,
        projections: &[(EntityId, Vec2)],
    ) -> usize {
        let mut seen = BTreeSet::new();
        let mut toggled = 0;
        for &(id, point) in projections {
            if rect.contains(point) && registry.contains(id) && seen.insert(id) {
                self.toggle_select(registry, id);
                toggled += 1;
            }
        }
        debug!(toggled, selected = self.selection.len(), "rectangle selection");
        toggled
    }

    // -- drag ---------------------------------------------------------------

    /// Start dragging `target`, recording its transform for undo.
    ///
    /// Entities that are not live or lack the pickup capability are ignored.
    /// Returns whether a drag started.
    pub fn pickup(
        &mut self,
        registry: &EntityRegistry,
        history: &mut ActionHistory,
        target: EntityId,
    ) -> bool {
        match registry.get(target) {
            Ok(entity) if entity.can_pick_up => {}
            Ok(_) => {
                trace!(entity = %target, "pickup ignored: entity cannot be picked up");
                return false;
            }
            Err(_) => return false,
        }
        self.release();
        history.push_transform(registry, [target]);
        self.drag = Some(Drag { entity: target });
        debug!(entity = %target, "pickup");
        true
    }

    /// Move the held entity over `surface_point`.
    ///
    /// Movement is covered by the step recorded at pickup. If another step
    /// has been recorded since, the held entity's transform is recorded
    /// again before it moves. Returns whether a step was pushed.
    pub fn drag_to(
        &mut self,
        registry: &mut EntityRegistry,
        history: &mut ActionHistory,
        surface_point: Vec3,
    ) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        let Ok(entity) = registry.get(drag.entity) else {
            // Deleted out from under us.
            self.drag = None;
            return false;
        };
        let transform = Transform {
            position: surface_point + Vec3::Y * self.hold_height,
            ..entity.transform
        };
        if transform == entity.transform {
            return false;
        }

        let pushed = !top_restores_transforms(history, &[drag.entity])
            && history.push_transform(registry, [drag.entity]).is_some();
        if pushed {
            debug!(entity = %drag.entity, "drag continues as a new step");
        }
        let _ = registry.set_transform(drag.entity, transform);
        pushed
    }

    /// End the drag, if any. Not recorded.
    pub fn release(&mut self) {
        if let Some(drag) = self.drag.take() {
            debug!(entity = %drag.entity, "release");
        }
    }

    /// The entity currently being dragged.
    pub fn held(&self) -> Option<EntityId> {
        self.drag.map(|d| d.entity)
    }

    // -- rotate -------------------------------------------------------------

    /// Apply one tick of a scroll-rotate gesture at simulation time `now`.
    ///
    /// Only the first tick of a burst records the selection's transforms.
    /// Every tick restarts the debounce timer. Returns whether an action was
    /// pushed.
    pub fn rotate_gesture(
        &mut self,
        registry: &mut EntityRegistry,
        history: &mut ActionHistory,
        delta: f32,
        now: f64,
    ) -> bool {
        if self.selection.is_empty() || delta == 0.0 {
            return false;
        }

        let continues =
            !self.scroll_burst_open && top_restores_transforms(history, &self.selection);
        let pushed = if continues {
            false
        } else {
            self.scroll_burst_open = false;
            history
                .push_transform(registry, self.selection.iter().copied())
                .is_some()
        };

        let degrees = delta * self.rotate_degrees_per_unit;
        for &id in &self.selection {
            if let Ok(entity) = registry.get(id) {
                let rotated = entity.transform.rotated_about_y(degrees);
                let _ = registry.set_transform(id, rotated);
            }
        }
        self.scroll_timer.restart(now);
        trace!(degrees, pushed, "rotate gesture tick");
        pushed
    }

    /// Fire due timers. When the scroll timer fires, the next scroll tick
    /// starts a new undo step.
    pub fn poll_timers(&mut self, now: f64) {
        if self.scroll_timer.poll(now) {
            self.scroll_burst_open = true;
            trace!(now, "scroll burst closed");
        }
    }

    /// Whether the last scroll burst has ended (timer fired, selection
    /// changed, undo). The next scroll tick then records a new step; it also
    /// does when the burst's step is no longer on top of the history.
    pub fn scroll_burst_open(&self) -> bool {
        self.scroll_burst_open
    }

    /// End the current scroll burst early. A burst covers one selection; a
    /// selection change means the next scroll rotates a different set and
    /// has to be recorded.
    fn close_scroll_burst(&mut self) {
        self.scroll_timer.cancel();
        self.scroll_burst_open = true;
    }

    // -- recorded edits -----------------------------------------------------

    /// Create an entity and record it. Returns the new id.
    pub fn spawn(
        &mut self,
        registry: &mut EntityRegistry,
        history: &mut ActionHistory,
        transform: Transform,
        color: Color,
    ) -> EntityId {
        let id = registry.create(transform, color);
        history.push_add([id]);
        debug!(entity = %id, "spawned");
        id
    }

    /// Record and then destroy every selected entity. Returns how many were
    /// deleted.
    pub fn delete_selected(
        &mut self,
        registry: &mut EntityRegistry,
        history: &mut ActionHistory,
    ) -> usize {
        if self.selection.is_empty() {
            return 0;
        }
        if self.held().is_some_and(|held| self.is_selected(held)) {
            self.release();
        }
        // Captured in creation order so undo re-creates them in that order.
        let targets: Vec<EntityId> = registry
            .live_ids()
            .iter()
            .copied()
            .filter(|&id| self.is_selected(id))
            .collect();
        history.push_delete(registry, targets);
        let mut deleted = 0;
        for id in std::mem::take(&mut self.selection) {
            if registry.destroy(id).is_ok() {
                deleted += 1;
            }
        }
        self.close_scroll_burst();
        debug!(deleted, "deleted selection");
        deleted
    }

    /// Record prior colors and then recolor every selected entity. Returns
    /// whether an action was pushed.
    pub fn recolor_selected(
        &mut self,
        registry: &mut EntityRegistry,
        history: &mut ActionHistory,
        color: Color,
    ) -> bool {
        if history
            .push_color(registry, self.selection.iter().copied())
            .is_none()
        {
            return false;
        }
        for &id in &self.selection {
            let _ = registry.set_color(id, color);
        }
        debug!(count = self.selection.len(), ?color, "recolored selection");
        true
    }

    /// Undo the most recent action.
    ///
    /// Any drag is released first so the undo never races a live drag
    /// write. Afterwards the selection is pruned of entities the undo
    /// destroyed.
    pub fn undo(
        &mut self,
        registry: &mut EntityRegistry,
        history: &mut ActionHistory,
    ) -> Result<UndoOutcome, CoreError> {
        self.release();
        let undone = history.attempt_undo(registry)?;
        let before = self.selection.len();
        self.selection.retain(|&id| registry.contains(id));
        if undone || self.selection.len() != before {
            self.close_scroll_burst();
        }
        if undone {
            Ok(UndoOutcome::Undone)
        } else {
            debug!("nothing to undo");
            Ok(UndoOutcome::NothingToUndo)
        }
    }

    /// Drop drag and selection, e.g. when leaving the build mode. The scroll
    /// burst is closed so the next scroll records again.
    pub fn suspend(&mut self, registry: &mut EntityRegistry) {
        self.release();
        self.clear_selection(registry);
        self.close_scroll_burst();
    }

    // -- per-tick dispatch --------------------------------------------------

    /// Interpret one frame of input at simulation time `now`.
    ///
    /// Order within a frame: timers, release, pickup, drag, selection,
    /// rotate, recolor, spawn, delete, undo.
    pub fn tick(
        &mut self,
        input: &InputFrame,
        now: f64,
        registry: &mut EntityRegistry,
        history: &mut ActionHistory,
    ) -> Result<FrameReport, CoreError> {
        let mut report = FrameReport::default();
        self.poll_timers(now);

        if input.pickup_released {
            self.release();
        }
        if input.pickup_pressed {
            if let Some(target) = input.hit {
                if self.pickup(registry, history, target) {
                    report.pushed += 1;
                }
            }
        }
        if let Some(point) = input.surface_point {
            if self.drag_to(registry, history, point) {
                report.pushed += 1;
            }
        }

        if input.clear_selection {
            self.clear_selection(registry);
        }
        if input.select_pressed {
            if let Some(target) = input.hit {
                self.toggle_select(registry, target);
            }
        }
        if let Some(rect_select) = &input.rect_select {
            self.mass_select(registry, rect_select.rect, &rect_select.projections);
        }

        if input.scroll_delta != 0.0
            && self.rotate_gesture(registry, history, input.scroll_delta, now)
        {
            report.pushed += 1;
        }
        if let Some(color) = input.recolor {
            if self.recolor_selected(registry, history, color) {
                report.pushed += 1;
            }
        }
        if let Some(color) = input.spawn {
            match input.surface_point {
                Some(point) => {
                    let id = self.spawn(registry, history, Transform::from_position(point), color);
                    report.spawned = Some(id);
                    report.pushed += 1;
                }
                None => trace!("spawn ignored: pointer is not over the build surface"),
            }
        }
        if input.delete_pressed && self.delete_selected(registry, history) > 0 {
            report.pushed += 1;
        }
        if input.undo_pressed {
            report.undo = Some(self.undo(registry, history)?);
        }
        Ok(report)
    }
}

impl Default for BuildController {
    fn default() -> Self {
        Self::new(&ControllerConfig::default())
    }
}

/// Whether undoing the top of `history` writes back the transform of every
/// id in `ids`.
fn top_restores_transforms(history: &ActionHistory, ids: &[EntityId]) -> bool {
    matches!(history.peek(), Some(Action::Transform(t)) if t.covers(ids.iter().copied()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
