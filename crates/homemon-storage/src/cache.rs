use chrono::{DateTime, Utc};
use homemon_common::types::{Datapoint, Topic};
use std::collections::BTreeMap;
use std::sync::RwLock;

type PositionMap = BTreeMap<String, BTreeMap<String, Datapoint>>;

/// Process-wide map from topic to its most recent reading.
///
/// Writes are last-writer-wins with no timestamp comparison; the transport
/// collaborator guarantees in-order delivery per topic and flags retained
/// snapshots, so the callers never regress the cache by construction.
#[derive(Default)]
pub struct LastValueCache {
    // position -> measurement -> datapoint; BTreeMaps keep the accessor
    // output sorted without re-sorting on every call.
    inner: RwLock<PositionMap>,
}

impl LastValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PositionMap> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Unconditional overwrite. `time = None` marks a retained snapshot.
    pub fn set(&self, topic: &Topic, time: Option<DateTime<Utc>>, value: f64) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner
            .entry(topic.position.clone())
            .or_default()
            .insert(topic.measurement.clone(), Datapoint { time, value });
    }

    pub fn get(&self, topic: &Topic) -> Option<Datapoint> {
        self.read()
            .get(&topic.position)
            .and_then(|measurements| measurements.get(&topic.measurement))
            .copied()
    }

    /// Positions whose measurement map satisfies `predicate`, sorted.
    ///
    /// Used by the UI collaborator to discover which positions currently
    /// expose a given measurement type.
    pub fn positions_where<F>(&self, predicate: F) -> Vec<String>
    where
        F: Fn(&BTreeMap<String, Datapoint>) -> bool,
    {
        self.read()
            .iter()
            .filter(|(_, measurements)| predicate(measurements))
            .map(|(position, _)| position.clone())
            .collect()
    }

    /// All known positions, sorted.
    pub fn positions(&self) -> Vec<String> {
        self.positions_where(|_| true)
    }

    /// Distinct measurement names across all positions, sorted.
    pub fn measurements(&self) -> Vec<String> {
        let inner = self.read();
        let set: std::collections::BTreeSet<&String> = inner
            .values()
            .flat_map(|measurements| measurements.keys())
            .collect();
        set.into_iter().cloned().collect()
    }

    /// Measurement names currently known at `position`, sorted.
    pub fn measurements_of(&self, position: &str) -> Vec<String> {
        self.read()
            .get(position)
            .map(|measurements| measurements.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All known topics, sorted.
    pub fn topics(&self) -> Vec<Topic> {
        self.read()
            .iter()
            .flat_map(|(position, measurements)| {
                measurements
                    .keys()
                    .map(|measurement| Topic::new(position.clone(), measurement.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
