//! Undo stack with an entity -> action reverse index.
//!
//! [`ActionHistory`] keeps recorded [`Action`]s in push order and undoes them
//! strictly last-in-first-out. Next to the stack it maintains a reverse index
//! from each [`EntityId`] to the keys of the stacked actions that mention it.
//!
//! The index exists for one reason: undoing a delete brings entities back
//! under new ids, and every older action that still mentions the old ids has
//! to be pointed at the new ones before it can be undone in turn. The index
//! makes that a lookup instead of a scan of the whole stack.
//!
//! # Invariant
//!
//! The index describes exactly the actions on the stack: an action that has
//! been popped has no entries left, and every target of a stacked action has
//! an entry containing that action's key. [`ActionHistory::verify_index`]
//! checks this.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::action::{Action, ActionKind, AddAction, ColorAction, DeleteAction, TransformAction};
use crate::entity::EntityId;
use crate::registry::EntityRegistry;
use crate::CoreError;

// ---------------------------------------------------------------------------
// ActionKey
// ---------------------------------------------------------------------------

/// Identifies one pushed action for the lifetime of the history.
///
/// Keys increase monotonically with push order, so the stack is always
/// sorted by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionKey(u64);

impl ActionKey {
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ActionHistory
// ---------------------------------------------------------------------------

/// The undo stack.
#[derive(Debug, Default)]
pub struct ActionHistory {
    /// Oldest first; the top of the stack is the last element.
    stack: Vec<(ActionKey, Action)>,
    /// Entity -> keys of stacked actions that reference it.
    index: HashMap<EntityId, BTreeSet<ActionKey>>,
    next_key: u64,
}

impl ActionHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    // -- pushing ------------------------------------------------------------

    /// Record an action. Returns `None` (and records nothing) when the action
    /// has no targets, since undoing it would be a no-op step.
    pub fn push(&mut self, action: impl Into<Action>) -> Option<ActionKey> {
        let action = action.into();
        let targets = action.target_ids();
        if targets.is_empty() {
            debug!(action = %action.kind(), "ignoring action with no targets");
            return None;
        }

        let key = ActionKey(self.next_key);
        self.next_key += 1;
        for id in &targets {
            self.index.entry(*id).or_default().insert(key);
        }
        debug!(
            action = %action.kind(),
            key = %key,
            targets = targets.len(),
            depth = self.stack.len() + 1,
            "action pushed"
        );
        self.stack.push((key, action));
        Some(key)
    }

    /// Record that `created` were just added.
    pub fn push_add(&mut self, created: impl IntoIterator<Item = EntityId>) -> Option<ActionKey> {
        self.push(AddAction::new(created))
    }

    /// Capture `ids` for a delete that is about to happen.
    pub fn push_delete(
        &mut self,
        registry: &EntityRegistry,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> Option<ActionKey> {
        self.push(DeleteAction::capture(registry, ids))
    }

    /// Capture the colors of `ids` ahead of a recolor.
    pub fn push_color(
        &mut self,
        registry: &EntityRegistry,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> Option<ActionKey> {
        self.push(ColorAction::capture(registry, ids))
    }

    /// Capture the transforms of `ids` ahead of a move or rotation.
    pub fn push_transform(
        &mut self,
        registry: &EntityRegistry,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> Option<ActionKey> {
        self.push(TransformAction::capture(registry, ids))
    }

    // -- undo ---------------------------------------------------------------

    /// Undo the most recent action.
    ///
    /// Returns `Ok(false)` without touching anything when the stack is empty.
    /// When the undone action was a delete, references to the deleted ids in
    /// every remaining action are migrated to the ids of the re-created
    /// entities.
    ///
    /// # Errors
    ///
    /// [`CoreError::IndexCorruption`] when the reverse index disagrees with
    /// the stack. That is a bug; the history should be discarded.
    pub fn attempt_undo(&mut self, registry: &mut EntityRegistry) -> Result<bool, CoreError> {
        let Some((key, mut action)) = self.stack.pop() else {
            debug!("nothing to undo");
            return Ok(false);
        };

        for id in action.target_ids() {
            self.unindex(id, key);
        }

        let report = action.undo(registry);
        debug!(
            action = %action.kind(),
            key = %key,
            restored = report.restored,
            skipped = report.skipped.len(),
            depth = self.stack.len(),
            "action undone"
        );

        if let Some(updated) = action.updated_instances() {
            for (&old, &new) in updated {
                self.migrate(old, new)?;
            }
        }
        Ok(true)
    }

    /// Drop `key` from `id`'s entry, removing the entry once it is empty.
    fn unindex(&mut self, id: EntityId, key: ActionKey) {
        if let Some(keys) = self.index.get_mut(&id) {
            keys.remove(&key);
            if keys.is_empty() {
                self.index.remove(&id);
            }
        }
    }

    /// Point everything that referenced `old` at `new`.
    fn migrate(&mut self, old: EntityId, new: EntityId) -> Result<(), CoreError> {
        if self.index.contains_key(&new) {
            return Err(corruption(old, new, "new id already has an index entry".to_owned()));
        }
        // No entry means no remaining action mentions `old`.
        let Some(keys) = self.index.remove(&old) else {
            return Ok(());
        };

        for &key in &keys {
            let Ok(pos) = self.stack.binary_search_by_key(&key, |(k, _)| *k) else {
                return Err(corruption(
                    old,
                    new,
                    format!("index names action {key} which is not on the stack"),
                ));
            };
            self.stack[pos].1.remap_id(old, new);
        }
        debug!(old = %old, new = %new, actions = keys.len(), "entity references remapped");
        self.index.insert(new, keys);
        Ok(())
    }

    // -- introspection ------------------------------------------------------

    /// Number of actions that can be undone.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Kind of the action the next undo would reverse.
    pub fn peek_kind(&self) -> Option<ActionKind> {
        self.stack.last().map(|(_, action)| action.kind())
    }

    /// The action the next undo would reverse.
    pub fn peek(&self) -> Option<&Action> {
        self.stack.last().map(|(_, action)| action)
    }

    /// Look up a stacked action by key.
    pub fn action(&self, key: ActionKey) -> Option<&Action> {
        self.stack
            .binary_search_by_key(&key, |(k, _)| *k)
            .ok()
            .map(|pos| &self.stack[pos].1)
    }

    /// Stacked actions, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = (ActionKey, &Action)> + '_ {
        self.stack.iter().rev().map(|(key, action)| (*key, action))
    }

    /// Keys of stacked actions that reference `id`, oldest first.
    pub fn references(&self, id: EntityId) -> Vec<ActionKey> {
        self.index
            .get(&id)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every entity id currently referenced by some stacked action.
    pub fn referenced_ids(&self) -> BTreeSet<EntityId> {
        self.index.keys().copied().collect()
    }

    /// Check the reverse index against the stack.
    pub fn verify_index(&self) -> Result<(), CoreError> {
        let mut expected: BTreeMap<EntityId, BTreeSet<ActionKey>> = BTreeMap::new();
        for (key, action) in &self.stack {
            for id in action.target_ids() {
                expected.entry(id).or_default().insert(*key);
            }
        }
        let actual: BTreeMap<EntityId, BTreeSet<ActionKey>> = self
            .index
            .iter()
            .map(|(id, keys)| (*id, keys.clone()))
            .collect();
        if expected != actual {
            return Err(CoreError::IndexMismatch {
                details: format!("expected {expected:?}, found {actual:?}"),
            });
        }
        Ok(())
    }

    /// Forget everything. Used at reset boundaries only.
    pub fn clear(&mut self) {
        debug!(discarded = self.stack.len(), "history cleared");
        self.stack.clear();
        self.index.clear();
    }
}

fn corruption(old: EntityId, new: EntityId, details: String) -> CoreError {
    error!(old = %old, new = %new, %details, "action history index corrupted");
    CoreError::IndexCorruption { old, new, details }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
