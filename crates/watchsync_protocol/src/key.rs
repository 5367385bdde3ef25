//! Key space shared by the local and remote stores.
//!
//! Local keys are bare (`video_<id>`, `playlist_<id>`, `deleted_video_<id>`,
//! `deleted_playlist_<id>`). Remote keys carry a [`Namespace`] prefix in
//! front of the same string.

use crate::error::{ProtocolError, ProtocolResult};
use std::fmt;

/// Prefix applied to every remote key unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "ns_";

const TOMBSTONE_PREFIX: &str = "deleted_";

/// The kinds of records that are synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    /// Watch-progress entry for a single video.
    Video,
    /// Playlist entry.
    Playlist,
}

impl ItemKind {
    /// All kinds, in key-parsing order.
    pub const ALL: [ItemKind; 2] = [ItemKind::Video, ItemKind::Playlist];

    /// Returns the key prefix for records of this kind.
    pub fn record_prefix(&self) -> &'static str {
        match self {
            ItemKind::Video => "video_",
            ItemKind::Playlist => "playlist_",
        }
    }

    /// Returns the key prefix for tombstones of this kind.
    pub fn tombstone_prefix(&self) -> &'static str {
        match self {
            ItemKind::Video => "deleted_video_",
            ItemKind::Playlist => "deleted_playlist_",
        }
    }

    /// Returns the lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Video => "video",
            ItemKind::Playlist => "playlist",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical identity of a synchronized item, independent of whether it is
/// currently a record or a tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    /// Record kind.
    pub kind: ItemKind,
    /// Identifier, unique within its kind.
    pub id: String,
}

impl ItemId {
    /// Creates a new item id.
    pub fn new(kind: ItemKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Creates a video item id.
    pub fn video(id: impl Into<String>) -> Self {
        Self::new(ItemKind::Video, id)
    }

    /// Creates a playlist item id.
    pub fn playlist(id: impl Into<String>) -> Self {
        Self::new(ItemKind::Playlist, id)
    }

    /// Returns the key under which the record for this id is stored.
    pub fn record_key(&self) -> ItemKey {
        ItemKey::Record(self.clone())
    }

    /// Returns the key under which the tombstone for this id is stored.
    pub fn tombstone_key(&self) -> ItemKey {
        ItemKey::Tombstone(self.clone())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A parsed store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKey {
    /// `video_<id>` or `playlist_<id>`.
    Record(ItemId),
    /// `deleted_video_<id>` or `deleted_playlist_<id>`.
    Tombstone(ItemId),
}

impl ItemKey {
    /// Parses a bare (local key-space) key.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotAnItem`] for keys outside the item key
    /// space (settings and the like) and [`ProtocolError::Malformed`] for
    /// item keys that carry no id.
    pub fn parse(key: &str) -> ProtocolResult<Self> {
        if key.starts_with(TOMBSTONE_PREFIX) {
            for kind in ItemKind::ALL {
                if let Some(id) = key.strip_prefix(kind.tombstone_prefix()) {
                    return Self::checked(key, ItemKey::Tombstone(ItemId::new(kind, id)));
                }
            }
            return Err(ProtocolError::NotAnItem(key.to_string()));
        }

        for kind in ItemKind::ALL {
            if let Some(id) = key.strip_prefix(kind.record_prefix()) {
                return Self::checked(key, ItemKey::Record(ItemId::new(kind, id)));
            }
        }

        Err(ProtocolError::NotAnItem(key.to_string()))
    }

    fn checked(raw: &str, key: ItemKey) -> ProtocolResult<Self> {
        if key.item_id().id.is_empty() {
            Err(ProtocolError::malformed(raw, "no id after key prefix"))
        } else {
            Ok(key)
        }
    }

    /// Returns the identity this key refers to.
    pub fn item_id(&self) -> &ItemId {
        match self {
            ItemKey::Record(id) | ItemKey::Tombstone(id) => id,
        }
    }

    /// Returns the record kind.
    pub fn kind(&self) -> ItemKind {
        self.item_id().kind
    }

    /// Returns true for tombstone keys.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, ItemKey::Tombstone(_))
    }

    /// Returns true if `key` parses as an item key.
    pub fn is_item_key(key: &str) -> bool {
        Self::parse(key).is_ok()
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Record(id) => write!(f, "{}{}", id.kind.record_prefix(), id.id),
            ItemKey::Tombstone(id) => write!(f, "{}{}", id.kind.tombstone_prefix(), id.id),
        }
    }
}

/// Remote key namespace.
///
/// The prefix decouples logical record identity from per-installation
/// identifiers: every installation reads and writes the same prefixed keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    /// Creates a namespace with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the raw prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Maps a local key into the remote key space.
    pub fn apply(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Maps a remote key into the local key space.
    ///
    /// Returns `None` for keys outside this namespace.
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
    }

    /// Strips the prefix if present, otherwise returns the key unchanged.
    ///
    /// Remote snapshots normally arrive already stripped by the store
    /// adapter; this accepts either form.
    pub fn normalize<'a>(&self, key: &'a str) -> &'a str {
        if self.prefix.is_empty() || ItemKey::is_item_key(key) {
            return key;
        }
        self.strip(key).unwrap_or(key)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
