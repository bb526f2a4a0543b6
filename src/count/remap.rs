use std::collections::HashMap;

use serde::Serialize;

use crate::detect::TrackRef;

/// Sequential identifier assigned on first sight of a track reference within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps detector track references to session ids starting at 1.
///
/// Mappings are never evicted during a session; tracker ID churn is assumed to fit in
/// memory for a session's lifetime. A track reference that the detector reuses for a
/// new physical object keeps its old session id: there is no in-band signal to tell the
/// two cases apart.
#[derive(Debug)]
pub struct IdentityRemapper {
    ids: HashMap<TrackRef, SessionId>,
    next: u64,
}

impl IdentityRemapper {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            next: 1,
        }
    }

    pub fn remap(&mut self, track_ref: TrackRef) -> SessionId {
        let next = &mut self.next;
        *self.ids.entry(track_ref).or_insert_with(|| {
            let id = SessionId(*next);
            *next += 1;
            id
        })
    }

    /// Discard all mappings; the next allocation is 1 again.
    pub fn reset(&mut self) {
        self.ids.clear();
        self.next = 1;
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for IdentityRemapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequentially_and_is_stable() {
        let mut remapper = IdentityRemapper::new();
        assert_eq!(remapper.remap(TrackRef(9_000_001)), SessionId(1));
        assert_eq!(remapper.remap(TrackRef(42)), SessionId(2));
        assert_eq!(remapper.remap(TrackRef(9_000_001)), SessionId(1));
        assert_eq!(remapper.remap(TrackRef(42)), SessionId(2));
        assert_eq!(remapper.len(), 2);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut remapper = IdentityRemapper::new();
        remapper.remap(TrackRef(5));
        remapper.remap(TrackRef(6));
        remapper.reset();
        assert!(remapper.is_empty());
        assert_eq!(remapper.remap(TrackRef(6)), SessionId(1));
    }
}
