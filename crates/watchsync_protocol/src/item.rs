//! Records, tombstones and parsed snapshots.

use crate::error::{ProtocolError, ProtocolResult};
use crate::key::{ItemId, ItemKey, Namespace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// A store snapshot as key/value pairs, exactly as the store returns them.
pub type RawSnapshot = BTreeMap<String, Value>;

/// Converts a duration to whole milliseconds.
pub fn duration_ms(duration: Duration) -> Timestamp {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Reads a numeric time field from a JSON object.
///
/// Integers and non-negative floats are accepted; floats are truncated.
pub fn time_field(value: &Value, field: &str) -> Option<Timestamp> {
    let raw = value.as_object()?.get(field)?;
    if let Some(ms) = raw.as_u64() {
        return Some(ms);
    }
    match raw.as_f64() {
        Some(ms) if ms.is_finite() && ms >= 0.0 => Some(ms as u64),
        _ => None,
    }
}

/// Effective last-modified time of a record: `timestamp`, else
/// `lastUpdated`, else 0.
pub fn record_time(value: &Value) -> Timestamp {
    time_field(value, "timestamp")
        .or_else(|| time_field(value, "lastUpdated"))
        .unwrap_or(0)
}

/// Deletion time of a tombstone: `deletedAt`, else `timestamp`.
pub fn deletion_time(value: &Value) -> Option<Timestamp> {
    time_field(value, "deletedAt").or_else(|| time_field(value, "timestamp"))
}

/// A watch-progress or playlist record.
///
/// Only used to build values; the merge treats stored records as opaque
/// JSON and never rewrites their fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Item id, duplicated from the key.
    pub id: String,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Playback position in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// Total duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Last-modified time.
    pub timestamp: Timestamp,
    /// Flags and any other payload fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Creates a record with only an id and a timestamp.
    pub fn new(id: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            title: None,
            time: None,
            duration: None,
            url: None,
            timestamp,
            extra: Map::new(),
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets playback position and duration.
    pub fn with_progress(mut self, time: f64, duration: f64) -> Self {
        self.time = Some(time);
        self.duration = Some(duration);
        self
    }

    /// Sets the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets a boolean flag such as `isShorts`.
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.extra.insert(name.into(), Value::Bool(value));
        self
    }

    /// Serializes the record into a store value.
    pub fn to_value(&self) -> ProtocolResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A soft-delete marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    /// Deletion time.
    pub deleted_at: Timestamp,
}

impl Tombstone {
    /// Creates a tombstone deleted at `deleted_at`.
    pub fn new(deleted_at: Timestamp) -> Self {
        Self { deleted_at }
    }

    /// Serializes the tombstone into a store value.
    pub fn to_value(&self) -> ProtocolResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A stored item with its key parsed and its effective time derived.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Parsed key (local key space).
    pub key: ItemKey,
    /// Record effective time, or tombstone deletion time.
    pub time: Timestamp,
    /// The stored value, untouched.
    pub value: Value,
}

impl Entry {
    /// Interprets a stored key/value pair.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::NotAnItem`] if the key is outside the item key space,
    /// [`ProtocolError::Malformed`] if the key has no id, the value is not
    /// an object, or a tombstone has no deletion time.
    pub fn from_stored(key: &str, value: &Value) -> ProtocolResult<Self> {
        let parsed = ItemKey::parse(key)?;
        if !value.is_object() {
            return Err(ProtocolError::malformed(key, "value is not an object"));
        }

        let time = match parsed {
            ItemKey::Record(_) => record_time(value),
            ItemKey::Tombstone(_) => deletion_time(value)
                .ok_or_else(|| ProtocolError::malformed(key, "tombstone has no deletedAt"))?,
        };

        Ok(Self {
            key: parsed,
            time,
            value: value.clone(),
        })
    }

    /// Returns true for tombstones.
    pub fn is_tombstone(&self) -> bool {
        self.key.is_tombstone()
    }
}

/// A parsed store snapshot.
///
/// Malformed items are kept aside rather than failing the whole parse;
/// keys outside the item key space are dropped silently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<ItemKey, Entry>,
    malformed: Vec<ProtocolError>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a local (bare key) snapshot.
    pub fn parse(raw: &RawSnapshot) -> Self {
        Self::parse_keys(raw.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Parses a remote snapshot, stripping `namespace` where present.
    pub fn parse_remote(raw: &RawSnapshot, namespace: &Namespace) -> Self {
        Self::parse_keys(raw.iter().map(|(k, v)| (namespace.normalize(k), v)))
    }

    fn parse_keys<'a>(pairs: impl Iterator<Item = (&'a str, &'a Value)>) -> Self {
        let mut snapshot = Self::new();
        for (key, value) in pairs {
            match Entry::from_stored(key, value) {
                Ok(entry) => snapshot.insert(entry),
                Err(err) if err.is_malformed() => snapshot.malformed.push(err),
                Err(_) => {}
            }
        }
        snapshot
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, entry: Entry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    /// Looks up an entry by key.
    pub fn get(&self, key: &ItemKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Returns the record for `id`, if any.
    pub fn record(&self, id: &ItemId) -> Option<&Entry> {
        self.entries.get(&id.record_key())
    }

    /// Returns the tombstone for `id`, if any.
    pub fn tombstone(&self, id: &ItemId) -> Option<&Entry> {
        self.entries.get(&id.tombstone_key())
    }

    /// Iterates over all well-formed entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Returns every id that has a record or a tombstone.
    pub fn ids(&self) -> BTreeSet<ItemId> {
        self.entries.keys().map(|k| k.item_id().clone()).collect()
    }

    /// Items that were skipped as malformed.
    pub fn malformed(&self) -> &[ProtocolError] {
        &self.malformed
    }

    /// Number of well-formed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no well-formed entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts back to raw key/value pairs in the local key space.
    pub fn to_raw(&self) -> RawSnapshot {
        self.entries
            .values()
            .map(|e| (e.key.to_string(), e.value.clone()))
            .collect()
    }
}

impl FromIterator<Entry> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for entry in iter {
            snapshot.insert(entry);
        }
        snapshot
    }
}
