//! Storage key namespace.
//!
//! All indexing is done with explicit keys:
//!
//! | Key                                             | Value         |
//! |-------------------------------------------------|---------------|
//! | `playlist:id:{id}`                              | Playlist JSON |
//! | `playlist:slug:{slug}`                          | playlist id   |
//! | `playlist-group:id:{id}`                        | group JSON    |
//! | `playlist-group:slug:{slug}`                    | group id      |
//! | `playlist:playlist-group-id:{group}:{playlist}` | playlist id   |

pub const PLAYLIST_ID_PREFIX: &str = "playlist:id:";
pub const PLAYLIST_SLUG_PREFIX: &str = "playlist:slug:";
pub const GROUP_ID_PREFIX: &str = "playlist-group:id:";
pub const GROUP_SLUG_PREFIX: &str = "playlist-group:slug:";
pub const MEMBERSHIP_PREFIX: &str = "playlist:playlist-group-id:";

pub fn playlist_id(id: &str) -> String {
    format!("{PLAYLIST_ID_PREFIX}{id}")
}

pub fn playlist_slug(slug: &str) -> String {
    format!("{PLAYLIST_SLUG_PREFIX}{slug}")
}

pub fn group_id(id: &str) -> String {
    format!("{GROUP_ID_PREFIX}{id}")
}

pub fn group_slug(slug: &str) -> String {
    format!("{GROUP_SLUG_PREFIX}{slug}")
}

pub fn membership(group_id: &str, playlist_id: &str) -> String {
    format!("{MEMBERSHIP_PREFIX}{group_id}:{playlist_id}")
}

/// Prefix shared by every membership entry of one group.
pub fn membership_prefix(group_id: &str) -> String {
    format!("{MEMBERSHIP_PREFIX}{group_id}:")
}

/// The two record types that have an ID record and a slug pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Playlist,
    Group,
}

impl RecordKind {
    pub fn id_prefix(self) -> &'static str {
        match self {
            RecordKind::Playlist => PLAYLIST_ID_PREFIX,
            RecordKind::Group => GROUP_ID_PREFIX,
        }
    }

    pub fn slug_prefix(self) -> &'static str {
        match self {
            RecordKind::Playlist => PLAYLIST_SLUG_PREFIX,
            RecordKind::Group => GROUP_SLUG_PREFIX,
        }
    }

    pub fn id_key(self, id: &str) -> String {
        format!("{}{}", self.id_prefix(), id)
    }

    pub fn slug_key(self, slug: &str) -> String {
        format!("{}{}", self.slug_prefix(), slug)
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Playlist => "playlist",
            RecordKind::Group => "playlist group",
        }
    }
}

/// Split a membership key into `(group_id, playlist_id)`.
pub fn parse_membership(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix(MEMBERSHIP_PREFIX)?;
    let (group, playlist) = rest.split_once(':')?;
    if group.is_empty() || playlist.is_empty() {
        return None;
    }
    Some((group, playlist))
}

/// The identifier after `prefix`, if `key` carries it.
pub fn suffix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}
