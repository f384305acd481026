use std::fmt;

use fsapi_types::{parse_resource_version, Resource};

/// What happened to the object carried by a [`WatchEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// A committed change, carrying the post-mutation snapshot of the object.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchEvent<R> {
    pub event_type: EventType,
    pub object: R,
}

impl<R: Resource> WatchEvent<R> {
    pub fn added(object: R) -> Self {
        Self {
            event_type: EventType::Added,
            object,
        }
    }

    pub fn modified(object: R) -> Self {
        Self {
            event_type: EventType::Modified,
            object,
        }
    }

    pub fn deleted(object: R) -> Self {
        Self {
            event_type: EventType::Deleted,
            object,
        }
    }

    /// Version stamp of the carried object, `0` if it has none.
    pub fn version(&self) -> u64 {
        parse_resource_version(&self.object.metadata().resource_version).unwrap_or(0)
    }
}
