//! Reversible mutations recorded by the undo history.
//!
//! [`Action`] is a closed sum over the four things a player can do to the
//! layout: add entities, delete them, recolor them, or move/rotate them. Each
//! variant holds exactly the state it needs to reverse itself, captured before
//! the mutation happened.
//!
//! Undoing a [`DeleteAction`] re-creates entities, and the registry hands out
//! *new* ids for them. The action records the old -> new mapping in
//! [`DeleteAction::updated_instances`] so the history can
//! [`remap_id`](Action::remap_id) every other action that still refers to the
//! old ids.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entity::EntityId;
use crate::registry::EntityRegistry;
use crate::snapshot::{Color, Snapshot, Transform};

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// Discriminant of [`Action`], for logs and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Add,
    Delete,
    Color,
    Transform,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Add => "add",
            ActionKind::Delete => "delete",
            ActionKind::Color => "color",
            ActionKind::Transform => "transform",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// UndoReport
// ---------------------------------------------------------------------------

/// What a single [`Action::undo`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoReport {
    /// Entities written back, destroyed, or re-created.
    pub restored: usize,
    /// Targets that were no longer live and had to be skipped.
    pub skipped: Vec<EntityId>,
}

impl UndoReport {
    fn skip(&mut self, kind: ActionKind, entity: EntityId) {
        warn!(
            action = %kind,
            entity = %entity,
            "undo target is not live -- skipping write-back"
        );
        self.skipped.push(entity);
    }
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Entities created by one add. Undo destroys them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddAction {
    created: BTreeSet<EntityId>,
}

impl AddAction {
    pub fn new(created: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            created: created.into_iter().collect(),
        }
    }

    fn undo(&self, registry: &mut EntityRegistry, report: &mut UndoReport) {
        for &id in &self.created {
            match registry.destroy(id) {
                Ok(_) => report.restored += 1,
                Err(_) => report.skip(ActionKind::Add, id),
            }
        }
    }

    fn remap_id(&mut self, old: EntityId, new: EntityId) {
        if self.created.remove(&old) {
            self.created.insert(new);
        }
    }
}

/// Pre-delete snapshots. Undo re-creates the entities under new ids, in
/// the order they were captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteAction {
    deleted: Vec<(EntityId, DeletedEntity)>,
    /// Old id -> id of the re-created entity. Filled in by `undo`.
    updated_instances: BTreeMap<EntityId, EntityId>,
}

/// What is needed to bring one deleted entity back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct DeletedEntity {
    snapshot: Snapshot,
    can_pick_up: bool,
}

impl DeleteAction {
    /// Capture the current state of `ids` ahead of deleting them. Ids that
    /// are not live are left out, as are repeats.
    pub fn capture(registry: &EntityRegistry, ids: impl IntoIterator<Item = EntityId>) -> Self {
        let mut deleted: Vec<(EntityId, DeletedEntity)> = Vec::new();
        for id in ids {
            if deleted.iter().any(|(seen, _)| *seen == id) {
                continue;
            }
            match registry.get(id) {
                Ok(entity) => deleted.push((
                    id,
                    DeletedEntity {
                        snapshot: entity.snapshot(),
                        can_pick_up: entity.can_pick_up,
                    },
                )),
                Err(_) => warn!(entity = %id, "cannot capture delete of a dead entity"),
            }
        }
        Self {
            deleted,
            updated_instances: BTreeMap::new(),
        }
    }

    /// Old id -> new id for every entity re-created by the last undo. Empty
    /// before undo ran.
    pub fn updated_instances(&self) -> &BTreeMap<EntityId, EntityId> {
        &self.updated_instances
    }

    /// The snapshot captured for `id`, if it is one of the deleted entities.
    pub fn snapshot_of(&self, id: EntityId) -> Option<Snapshot> {
        self.deleted
            .iter()
            .find(|(old, _)| *old == id)
            .map(|(_, d)| d.snapshot)
    }

    fn undo(&mut self, registry: &mut EntityRegistry, report: &mut UndoReport) {
        self.updated_instances.clear();
        for &(old, deleted) in &self.deleted {
            let new = registry.create_with(
                deleted.snapshot.transform,
                deleted.snapshot.color,
                deleted.can_pick_up,
            );
            self.updated_instances.insert(old, new);
            report.restored += 1;
        }
    }

    fn remap_id(&mut self, old: EntityId, new: EntityId) {
        if let Some(entry) = self.deleted.iter_mut().find(|(id, _)| *id == old) {
            entry.0 = new;
        }
    }
}

/// Prior colors. Undo writes them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorAction {
    previous: BTreeMap<EntityId, Color>,
}

impl ColorAction {
    /// Capture the current colors of `ids` ahead of recoloring them.
    pub fn capture(registry: &EntityRegistry, ids: impl IntoIterator<Item = EntityId>) -> Self {
        let previous = ids
            .into_iter()
            .filter_map(|id| match registry.get(id) {
                Ok(entity) => Some((id, entity.color)),
                Err(_) => {
                    warn!(entity = %id, "cannot capture color of a dead entity");
                    None
                }
            })
            .collect();
        Self { previous }
    }

    /// The color `id` had when captured.
    pub fn previous_color(&self, id: EntityId) -> Option<Color> {
        self.previous.get(&id).copied()
    }

    fn undo(&self, registry: &mut EntityRegistry, report: &mut UndoReport) {
        for (&id, &color) in &self.previous {
            match registry.set_color(id, color) {
                Ok(()) => report.restored += 1,
                Err(_) => report.skip(ActionKind::Color, id),
            }
        }
    }

    fn remap_id(&mut self, old: EntityId, new: EntityId) {
        if let Some(color) = self.previous.remove(&old) {
            self.previous.insert(new, color);
        }
    }
}

/// Prior transforms. Undo writes them back and stops any motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformAction {
    previous: BTreeMap<EntityId, Transform>,
}

impl TransformAction {
    /// Capture the current transforms of `ids` ahead of moving them.
    pub fn capture(registry: &EntityRegistry, ids: impl IntoIterator<Item = EntityId>) -> Self {
        let previous = ids
            .into_iter()
            .filter_map(|id| match registry.get(id) {
                Ok(entity) => Some((id, entity.transform)),
                Err(_) => {
                    warn!(entity = %id, "cannot capture transform of a dead entity");
                    None
                }
            })
            .collect();
        Self { previous }
    }

    /// The transform `id` had when captured.
    pub fn previous_transform(&self, id: EntityId) -> Option<Transform> {
        self.previous.get(&id).copied()
    }

    /// Whether undoing this action writes back the transform of every id
    /// in `ids`.
    pub fn covers(&self, ids: impl IntoIterator<Item = EntityId>) -> bool {
        ids.into_iter().all(|id| self.previous.contains_key(&id))
    }

    fn undo(&self, registry: &mut EntityRegistry, report: &mut UndoReport) {
        for (&id, &transform) in &self.previous {
            match registry.set_transform(id, transform) {
                Ok(()) => {
                    // Entity is live, so this cannot fail.
                    let _ = registry.reset_motion(id);
                    report.restored += 1;
                }
                Err(_) => report.skip(ActionKind::Transform, id),
            }
        }
    }

    fn remap_id(&mut self, old: EntityId, new: EntityId) {
        if let Some(transform) = self.previous.remove(&old) {
            self.previous.insert(new, transform);
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One reversible mutation over one or more entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Add(AddAction),
    Delete(DeleteAction),
    Color(ColorAction),
    Transform(TransformAction),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Add(_) => ActionKind::Add,
            Action::Delete(_) => ActionKind::Delete,
            Action::Color(_) => ActionKind::Color,
            Action::Transform(_) => ActionKind::Transform,
        }
    }

    /// Reverse this action against `registry`.
    ///
    /// Must run at most once per recorded action; [`ActionHistory`] enforces
    /// this by popping before undoing. Targets that are no longer live are
    /// skipped and listed in the report.
    ///
    /// [`ActionHistory`]: crate::history::ActionHistory
    pub fn undo(&mut self, registry: &mut EntityRegistry) -> UndoReport {
        let mut report = UndoReport::default();
        match self {
            Action::Add(a) => a.undo(registry, &mut report),
            Action::Delete(a) => a.undo(registry, &mut report),
            Action::Color(a) => a.undo(registry, &mut report),
            Action::Transform(a) => a.undo(registry, &mut report),
        }
        report
    }

    /// Every entity id this action refers to.
    pub fn target_ids(&self) -> BTreeSet<EntityId> {
        match self {
            Action::Add(a) => a.created.clone(),
            Action::Delete(a) => a.deleted.iter().map(|(id, _)| *id).collect(),
            Action::Color(a) => a.previous.keys().copied().collect(),
            Action::Transform(a) => a.previous.keys().copied().collect(),
        }
    }

    /// Replace references to `old` with `new`. No-op when `old` is absent.
    pub fn remap_id(&mut self, old: EntityId, new: EntityId) {
        match self {
            Action::Add(a) => a.remap_id(old, new),
            Action::Delete(a) => a.remap_id(old, new),
            Action::Color(a) => a.remap_id(old, new),
            Action::Transform(a) => a.remap_id(old, new),
        }
    }

    /// Old -> new ids produced by undoing a delete. `None` for other kinds.
    pub fn updated_instances(&self) -> Option<&BTreeMap<EntityId, EntityId>> {
        match self {
            Action::Delete(a) => Some(a.updated_instances()),
            _ => None,
        }
    }
}

impl From<AddAction> for Action {
    fn from(a: AddAction) -> Self {
        Action::Add(a)
    }
}

impl From<DeleteAction> for Action {
    fn from(a: DeleteAction) -> Self {
        Action::Delete(a)
    }
}

impl From<ColorAction> for Action {
    fn from(a: ColorAction) -> Self {
        Action::Color(a)
    }
}

impl From<TransformAction> for Action {
    fn from(a: TransformAction) -> Self {
        Action::Transform(a)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn at(x: f32) -> Transform {
        Transform::from_position(Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn undo_add_destroys_created() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(at(0.0), Color::WHITE);
        let b = registry.create(at(1.0), Color::WHITE);
        let mut action = Action::from(AddAction::new([a, b]));
        let report = action.undo(&mut registry);
        assert_eq!(report.restored, 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn undo_delete_recreates_under_new_ids() {
        let mut registry = EntityRegistry::new();
        let a = registry.create_with(at(2.0), Color::RED, false);
        let mut action = Action::from(DeleteAction::capture(&registry, [a]));
        registry.destroy(a).unwrap();

        assert!(action.updated_instances().unwrap().is_empty());
        action.undo(&mut registry);

        let map = action.updated_instances().unwrap();
        let new = map[&a];
        assert_ne!(new, a);
        let entity = registry.get(new).unwrap();
        assert_eq!(entity.snapshot(), Snapshot::new(at(2.0), Color::RED));
        assert!(!entity.can_pick_up);
    }

    #[test]
    fn undo_delete_recreates_in_capture_order() {
        let mut registry = EntityRegistry::new();
        let scratch = registry.create(at(9.0), Color::BLACK);
        registry.destroy(scratch).unwrap();
        // `a` reuses slot 0 at generation 1, so it sorts after `b`.
        let a = registry.create(at(0.0), Color::RED);
        let b = registry.create(at(1.0), Color::BLUE);
        assert!(a > b);

        let mut action = Action::from(DeleteAction::capture(&registry, [a, b, a]));
        assert_eq!(action.target_ids().len(), 2);
        registry.destroy(a).unwrap();
        registry.destroy(b).unwrap();
        action.undo(&mut registry);

        let colors: Vec<Color> = registry.iter().map(|(_, e)| e.color).collect();
        assert_eq!(colors, vec![Color::RED, Color::BLUE]);
    }

    #[test]
    fn undo_color_restores_previous() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(at(0.0), Color::WHITE);
        let mut action = Action::from(ColorAction::capture(&registry, [a]));
        registry.set_color(a, Color::BLUE).unwrap();
        action.undo(&mut registry);
        assert_eq!(registry.get(a).unwrap().color, Color::WHITE);
    }

    #[test]
    fn undo_transform_restores_and_stops_motion() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(at(0.0), Color::WHITE);
        let mut action = Action::from(TransformAction::capture(&registry, [a]));
        registry.set_transform(a, at(5.0).rotated_about_y(45.0)).unwrap();
        registry.set_velocity(a, Vec3::X, Vec3::Y).unwrap();
        action.undo(&mut registry);
        let entity = registry.get(a).unwrap();
        assert_eq!(entity.transform, at(0.0));
        assert_eq!(entity.velocity, Vec3::ZERO);
        assert_eq!(entity.angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn undo_skips_dead_targets() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(at(0.0), Color::WHITE);
        let b = registry.create(at(1.0), Color::WHITE);
        let mut action = Action::from(ColorAction::capture(&registry, [a, b]));
        registry.destroy(a).unwrap();
        let report = action.undo(&mut registry);
        assert_eq!(report.restored, 1);
        assert_eq!(report.skipped, vec![a]);
    }

    #[test]
    fn transform_covers_only_captured_ids() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(at(0.0), Color::WHITE);
        let b = registry.create(at(1.0), Color::WHITE);
        let action = TransformAction::capture(&registry, [a]);
        assert!(action.covers([a]));
        assert!(action.covers([]));
        assert!(!action.covers([a, b]));
    }

    #[test]
    fn capture_ignores_dead_ids() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(at(0.0), Color::WHITE);
        registry.destroy(a).unwrap();
        let action = Action::from(TransformAction::capture(&registry, [a]));
        assert!(action.target_ids().is_empty());
    }

    #[test]
    fn remap_moves_references_and_ignores_absent_ids() {
        let mut registry = EntityRegistry::new();
        let a = registry.create(at(0.0), Color::WHITE);
        let b = registry.create(at(1.0), Color::WHITE);
        let c = registry.create(at(2.0), Color::WHITE);

        let mut actions = vec![
            Action::from(AddAction::new([a, b])),
            Action::from(DeleteAction::capture(&registry, [a])),
            Action::from(ColorAction::capture(&registry, [a, b])),
            Action::from(TransformAction::capture(&registry, [a])),
        ];
        for action in &mut actions {
            action.remap_id(a, c);
            // Absent id: nothing happens.
            action.remap_id(EntityId::new(99, 0), EntityId::new(100, 0));
        }
        for action in &actions {
            let targets = action.target_ids();
            assert!(!targets.contains(&a), "{} still references old id", action.kind());
            assert!(targets.contains(&c));
        }
    }
}
