//! Saved domino layouts.
//!
//! A [`SavedLayout`] is the ordered list of `{transform, color}` records of
//! every live entity, plus a BLAKE3 digest of those records so a corrupted or
//! hand-edited save is rejected instead of half-applied. Storage (files,
//! account databases) is up to the host; this module only produces and
//! consumes JSON.
//!
//! Records are order-significant. Applying a layout writes record `i` onto
//! the `i`-th live entity in creation order; it does not spawn or destroy.

use domino_core::registry::EntityRegistry;
use domino_core::snapshot::Snapshot;
use serde::{Deserialize, Serialize};

/// Ordered snapshot list with an integrity hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLayout {
    pub records: Vec<Snapshot>,
    /// BLAKE3 hex digest (64 lowercase hex chars) of `records`.
    pub hash: String,
}

/// Outcome of [`SavedLayout::apply_to`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutReport {
    /// Entities that received a record.
    pub restored: usize,
    /// Records left over because there were fewer live entities.
    pub unused_records: usize,
    /// Live entities left untouched because there were fewer records.
    pub untouched_entities: usize,
}

fn compute_hash(records: &[Snapshot]) -> String {
    let json_bytes =
        serde_json::to_vec(records).expect("layout records should always be JSON-serializable");
    blake3::hash(&json_bytes).to_hex().to_string()
}

impl SavedLayout {
    /// Capture every live entity in creation order.
    pub fn capture(registry: &EntityRegistry) -> Self {
        let records: Vec<Snapshot> = registry.iter().map(|(_, e)| e.snapshot()).collect();
        let hash = compute_hash(&records);
        Self { records, hash }
    }

    /// Whether the stored hash matches the records.
    pub fn verify(&self) -> bool {
        compute_hash(&self.records) == self.hash
    }

    pub fn to_json(&self) -> Result<String, anyhow::Error> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("failed to serialize layout: {e}"))
    }

    /// Parse and verify a layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or if the recorded hash does
    /// not match the records.
    pub fn from_json(json: &str) -> Result<Self, anyhow::Error> {
        let layout: SavedLayout = serde_json::from_str(json)
            .map_err(|e| anyhow::anyhow!("failed to parse layout: {e}"))?;
        let recomputed = compute_hash(&layout.records);
        if recomputed != layout.hash {
            return Err(anyhow::anyhow!(
                "layout hash mismatch: recorded {} but recomputed {}. \
                 The save may be corrupted or edited.",
                layout.hash,
                recomputed
            ));
        }
        Ok(layout)
    }

    /// Write records positionally onto the live entities.
    pub fn apply_to(&self, registry: &mut EntityRegistry) -> LayoutReport {
        let live = registry.live_ids().to_vec();
        let mut report = LayoutReport::default();
        for (id, record) in live.iter().zip(&self.records) {
            // Ids come straight from the live list.
            let _ = registry.set_transform(*id, record.transform);
            let _ = registry.set_color(*id, record.color);
            let _ = registry.reset_motion(*id);
            report.restored += 1;
        }
        report.unused_records = self.records.len().saturating_sub(live.len());
        report.untouched_entities = live.len().saturating_sub(self.records.len());
        if report.unused_records > 0 || report.untouched_entities > 0 {
            tracing::warn!(
                records = self.records.len(),
                entities = live.len(),
                "layout size does not match the live entity count"
            );
        }
        report
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
