//! The set of live placeable entities.
//!
//! [`EntityRegistry`] owns every domino in the scene and is the only place
//! their state is mutated. Rendering and physics are not driven from here
//! directly: each mutation appends a [`RegistryEvent`] to a pending queue and
//! the host drains it once per frame with
//! [`drain_events`](EntityRegistry::drain_events) to keep its scene objects in
//! step.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, IdAllocator};
use crate::snapshot::{Color, Snapshot, Transform};
use crate::CoreError;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One live placeable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub transform: Transform,
    pub color: Color,
    /// Whether the entity is part of the current selection.
    pub selected: bool,
    /// Entities without this capability ignore pickup gestures.
    pub can_pick_up: bool,
    /// Transient linear velocity owned by the physics collaborator.
    pub velocity: Vec3,
    /// Transient angular velocity owned by the physics collaborator.
    pub angular_velocity: Vec3,
}

impl Entity {
    fn new(transform: Transform, color: Color, can_pick_up: bool) -> Self {
        Self {
            transform,
            color,
            selected: false,
            can_pick_up,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }

    /// Current `{transform, color}`.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.transform, self.color)
    }
}

// ---------------------------------------------------------------------------
// RegistryEvent
// ---------------------------------------------------------------------------

/// A registry mutation the rendering/physics side has to mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A new entity exists and should get a scene object.
    Spawned { entity: EntityId, snapshot: Snapshot },
    /// The entity is gone; its scene object should be removed.
    Despawned { entity: EntityId },
    TransformChanged { entity: EntityId, transform: Transform },
    ColorChanged { entity: EntityId, color: Color },
    SelectionChanged { entity: EntityId, selected: bool },
    /// Velocities were zeroed (e.g. a transform was restored by undo).
    MotionReset { entity: EntityId },
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Owner of all live entities.
///
/// Lookups on an id that is not live fail with [`CoreError::NotFound`].
/// [`live_ids`](Self::live_ids) reports entities in creation order, which is
/// the order persisted layouts are restored in.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    allocator: IdAllocator,
    entities: HashMap<EntityId, Entity>,
    /// Live ids in creation order.
    order: Vec<EntityId>,
    pending_events: Vec<RegistryEvent>,
}

impl EntityRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pickable entity and return its fresh id.
    pub fn create(&mut self, transform: Transform, color: Color) -> EntityId {
        self.create_with(transform, color, true)
    }

    /// Create an entity with an explicit pickup capability.
    pub fn create_with(&mut self, transform: Transform, color: Color, can_pick_up: bool) -> EntityId {
        let id = self.allocator.allocate();
        self.entities
            .insert(id, Entity::new(transform, color, can_pick_up));
        self.order.push(id);
        self.pending_events.push(RegistryEvent::Spawned {
            entity: id,
            snapshot: Snapshot::new(transform, color),
        });
        tracing::trace!(entity = %id, "entity created");
        id
    }

    /// Remove an entity from the live set, returning its final state.
    pub fn destroy(&mut self, id: EntityId) -> Result<Entity, CoreError> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or(CoreError::NotFound { entity: id })?;
        self.allocator.retire(id);
        self.order.retain(|&live| live != id);
        self.pending_events
            .push(RegistryEvent::Despawned { entity: id });
        tracing::trace!(entity = %id, "entity destroyed");
        Ok(entity)
    }

    /// Read an entity.
    pub fn get(&self, id: EntityId) -> Result<&Entity, CoreError> {
        self.entities
            .get(&id)
            .ok_or(CoreError::NotFound { entity: id })
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: EntityId) -> bool {
        self.allocator.is_live(id) && self.entities.contains_key(&id)
    }

    /// Current `{transform, color}` of an entity.
    pub fn snapshot(&self, id: EntityId) -> Result<Snapshot, CoreError> {
        self.get(id).map(Entity::snapshot)
    }

    pub fn set_transform(&mut self, id: EntityId, transform: Transform) -> Result<(), CoreError> {
        self.entity_mut(id)?.transform = transform;
        self.pending_events
            .push(RegistryEvent::TransformChanged { entity: id, transform });
        Ok(())
    }

    pub fn set_color(&mut self, id: EntityId, color: Color) -> Result<(), CoreError> {
        self.entity_mut(id)?.color = color;
        self.pending_events
            .push(RegistryEvent::ColorChanged { entity: id, color });
        Ok(())
    }

    /// Set the selection flag. Emits an event only when the flag changes.
    pub fn set_selected(&mut self, id: EntityId, selected: bool) -> Result<(), CoreError> {
        let entity = self.entity_mut(id)?;
        if entity.selected != selected {
            entity.selected = selected;
            self.pending_events
                .push(RegistryEvent::SelectionChanged { entity: id, selected });
        }
        Ok(())
    }

    /// Write velocities reported by the physics collaborator.
    pub fn set_velocity(&mut self, id: EntityId, linear: Vec3, angular: Vec3) -> Result<(), CoreError> {
        let entity = self.entity_mut(id)?;
        entity.velocity = linear;
        entity.angular_velocity = angular;
        Ok(())
    }

    /// Zero both velocities.
    pub fn reset_motion(&mut self, id: EntityId) -> Result<(), CoreError> {
        self.set_velocity(id, Vec3::ZERO, Vec3::ZERO)?;
        self.pending_events
            .push(RegistryEvent::MotionReset { entity: id });
        Ok(())
    }

    /// Live ids in creation order.
    pub fn live_ids(&self) -> &[EntityId] {
        &self.order
    }

    /// Iterate live entities in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.order.iter().map(move |id| (*id, &self.entities[id]))
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Take every event recorded since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Number of events waiting to be drained.
    pub fn pending_event_count(&self) -> usize {
        self.pending_events.len()
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, CoreError> {
        self.entities
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: id })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
