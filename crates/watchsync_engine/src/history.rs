//! Record lifecycle on the local store: save, delete and count.

use crate::error::SyncResult;
use serde_json::Value;
use watchsync_protocol::{
    ItemId, ItemKind, ProtocolError, RawSnapshot, Record, Snapshot, Timestamp, Tombstone,
};
use watchsync_storage::LocalStore;

/// Per-kind counts of what the local store holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryCounts {
    /// Video records.
    pub videos: usize,
    /// Playlist records.
    pub playlists: usize,
    /// Video tombstones.
    pub deleted_videos: usize,
    /// Playlist tombstones.
    pub deleted_playlists: usize,
    /// Item keys whose value could not be read.
    pub malformed: usize,
}

impl HistoryCounts {
    /// Counts the items of a parsed snapshot.
    pub fn of(snapshot: &Snapshot) -> Self {
        let mut counts = Self {
            malformed: snapshot.malformed().len(),
            ..Self::default()
        };
        for entry in snapshot.entries() {
            let slot = match (entry.key.kind(), entry.is_tombstone()) {
                (ItemKind::Video, false) => &mut counts.videos,
                (ItemKind::Playlist, false) => &mut counts.playlists,
                (ItemKind::Video, true) => &mut counts.deleted_videos,
                (ItemKind::Playlist, true) => &mut counts.deleted_playlists,
            };
            *slot += 1;
        }
        counts
    }
}

/// Writes records and tombstones the way the rest of the system expects.
#[derive(Debug, Clone)]
pub struct LocalHistory {
    local: LocalStore,
}

impl LocalHistory {
    /// Wraps the local store.
    pub fn new(local: LocalStore) -> Self {
        Self { local }
    }

    /// Saves a record, stamping it with `now` and clearing any local
    /// tombstone for the same id.
    ///
    /// Only the local tombstone is cleared. If a tombstone for the id has
    /// already reached the remote store, the next sync suppresses this
    /// record again until that tombstone is purged (30 days after the
    /// delete).
    ///
    /// `payload` must be a JSON object; its fields are stored as given.
    pub async fn save(&self, id: &ItemId, payload: Value, now: Timestamp) -> SyncResult<()> {
        let Value::Object(mut fields) = payload else {
            let key = id.record_key().to_string();
            return Err(ProtocolError::malformed(key, "payload is not an object").into());
        };
        fields.insert("id".into(), Value::from(id.id.clone()));
        fields.insert("timestamp".into(), Value::from(now));

        let mut items = RawSnapshot::new();
        items.insert(id.record_key().to_string(), Value::Object(fields));
        self.local.set(items).await?;
        self.local.remove(&[id.tombstone_key().to_string()]).await?;
        Ok(())
    }

    /// Saves a typed record under `kind`, stamping it with `now`.
    pub async fn save_record(
        &self,
        kind: ItemKind,
        record: &Record,
        now: Timestamp,
    ) -> SyncResult<()> {
        let id = ItemId::new(kind, record.id.clone());
        self.save(&id, record.to_value()?, now).await
    }

    /// Deletes a record, leaving a tombstone dated `now`.
    pub async fn delete(&self, id: &ItemId, now: Timestamp) -> SyncResult<()> {
        let mut items = RawSnapshot::new();
        items.insert(id.tombstone_key().to_string(), Tombstone::new(now).to_value()?);
        self.local.set(items).await?;
        self.local.remove(&[id.record_key().to_string()]).await?;
        Ok(())
    }

    /// Reads the current record for `id`, if any.
    pub async fn get(&self, id: &ItemId) -> SyncResult<Option<Value>> {
        Ok(self.local.get_one(&id.record_key().to_string()).await?)
    }

    /// Counts records and tombstones per kind.
    pub async fn counts(&self) -> SyncResult<HistoryCounts> {
        let raw = self.local.get(None).await?;
        Ok(HistoryCounts::of(&Snapshot::parse(&raw)))
    }
}

impl From<LocalStore> for LocalHistory {
    fn from(local: LocalStore) -> Self {
        Self::new(local)
    }
}
