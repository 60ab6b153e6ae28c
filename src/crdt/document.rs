use std::collections::HashMap;

use super::event::CrdtEvent;
use super::global_id::GlobalId;

/// Stable handle into the document's entry arena. Entries are appended only
/// and never removed (a delete just flips `visible`), so a handle stays
/// valid for the lifetime of the `CrdtDocument` that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntryHandle(usize);

#[derive(Debug, Clone)]
struct CharEntry {
    gid: GlobalId,
    char: char,
    visible: bool,
    next: Option<EntryHandle>,
}

/// Errors raised when an event names a `gid` the document has never seen.
/// Both are protocol-level faults: the engine refuses to mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("unknown target gid {0:?}")]
    UnknownTarget(GlobalId),
}

/// Sequence CRDT: a singly-linked list of tombstoned-or-visible characters,
/// ordered so that any two replicas which have applied the same multiset of
/// events converge on the same materialized text regardless of apply order.
#[derive(Debug, Default)]
pub struct CrdtDocument {
    entries: Vec<CharEntry>,
    head: Option<EntryHandle>,
    index: HashMap<GlobalId, EntryHandle>,
}

impl CrdtDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events applied so far, visible or tombstoned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, gid: GlobalId) -> bool {
        self.index.contains_key(&gid)
    }

    /// Apply one event. Both insert and delete are idempotent: re-applying
    /// an event whose gid has already been handled is a no-op.
    pub fn apply(&mut self, event: &CrdtEvent) -> Result<(), DocumentError> {
        match event {
            CrdtEvent::Delete { gid } => self.apply_delete(*gid),
            CrdtEvent::Insert {
                gid,
                char,
                after_gid,
            } => self.apply_insert(*gid, *char, *after_gid),
        }
    }

    fn apply_delete(&mut self, gid: GlobalId) -> Result<(), DocumentError> {
        let handle = *self
            .index
            .get(&gid)
            .ok_or(DocumentError::UnknownTarget(gid))?;
        self.entries[handle.0].visible = false;
        Ok(())
    }

    fn apply_insert(
        &mut self,
        gid: GlobalId,
        char: char,
        after_gid: Option<GlobalId>,
    ) -> Result<(), DocumentError> {
        if self.index.contains_key(&gid) {
            return Ok(());
        }

        let mut prev: Option<EntryHandle> = match after_gid {
            None => None,
            Some(anchor) => {
                let handle = *self
                    .index
                    .get(&anchor)
                    .ok_or(DocumentError::UnknownTarget(anchor))?;
                Some(handle)
            }
        };

        let mut next = match prev {
            Some(p) => self.entries[p.0].next,
            None => self.head,
        };

        // Concurrent siblings sharing an anchor sort descending by gid so
        // every replica lands on the same order regardless of apply order.
        while let Some(candidate) = next {
            if self.entries[candidate.0].gid <= gid {
                break;
            }
            prev = Some(candidate);
            next = self.entries[candidate.0].next;
        }

        let new_handle = EntryHandle(self.entries.len());
        self.entries.push(CharEntry {
            gid,
            char,
            visible: true,
            next,
        });

        match prev {
            Some(p) => self.entries[p.0].next = Some(new_handle),
            None => self.head = Some(new_handle),
        }

        self.index.insert(gid, new_handle);
        Ok(())
    }

    /// Traverse from the head, collecting every visible character.
    pub fn materialize(&self) -> String {
        let mut result = String::with_capacity(self.entries.len());
        let mut current = self.head;
        while let Some(handle) = current {
            let entry = &self.entries[handle.0];
            if entry.visible {
                result.push(entry.char);
            }
            current = entry.next;
        }
        result
    }

    /// Count of currently-visible characters, without allocating a string.
    pub fn len_visible(&self) -> usize {
        let mut count = 0;
        let mut current = self.head;
        while let Some(handle) = current {
            let entry = &self.entries[handle.0];
            if entry.visible {
                count += 1;
            }
            current = entry.next;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(counter: u32, site_id: u32, char: char, after: Option<(u32, u32)>) -> CrdtEvent {
        CrdtEvent::Insert {
            gid: GlobalId::new(counter, site_id),
            char,
            after_gid: after.map(|(c, s)| GlobalId::new(c, s)),
        }
    }

    fn delete(counter: u32, site_id: u32) -> CrdtEvent {
        CrdtEvent::Delete {
            gid: GlobalId::new(counter, site_id),
        }
    }

    #[test]
    fn scenario_s1_single_site_linear_insert() {
        let mut doc = CrdtDocument::new();
        doc.apply(&insert(0, 1, 'a', None)).unwrap();
        doc.apply(&insert(1, 1, 'b', Some((0, 1)))).unwrap();
        doc.apply(&insert(2, 1, 'c', None)).unwrap();
        doc.apply(&delete(0, 1)).unwrap();
        assert_eq!(doc.materialize(), "cb");
    }

    #[test]
    fn scenario_s2_concurrent_siblings_tie_break_descending() {
        let mut doc = CrdtDocument::new();
        doc.apply(&insert(0, 1, 'x', None)).unwrap();
        doc.apply(&insert(1, 1, 'A', Some((0, 1)))).unwrap();
        doc.apply(&insert(1, 2, 'B', Some((0, 1)))).unwrap();
        assert_eq!(doc.materialize(), "xBA");
    }

    #[test]
    fn delete_is_idempotent() {
        let mut doc = CrdtDocument::new();
        doc.apply(&insert(0, 1, 'a', None)).unwrap();
        doc.apply(&delete(0, 1)).unwrap();
        doc.apply(&delete(0, 1)).unwrap();
        assert_eq!(doc.materialize(), "");
    }

    #[test]
    fn insert_is_idempotent() {
        let mut doc = CrdtDocument::new();
        let e = insert(0, 1, 'a', None);
        doc.apply(&e).unwrap();
        doc.apply(&e).unwrap();
        assert_eq!(doc.materialize(), "a");
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn delete_of_unknown_gid_fails() {
        let mut doc = CrdtDocument::new();
        let err = doc.apply(&delete(0, 1)).unwrap_err();
        assert_eq!(err, DocumentError::UnknownTarget(GlobalId::new(0, 1)));
    }

    #[test]
    fn insert_after_unknown_gid_fails() {
        let mut doc = CrdtDocument::new();
        let err = doc.apply(&insert(0, 1, 'a', Some((5, 5)))).unwrap_err();
        assert_eq!(err, DocumentError::UnknownTarget(GlobalId::new(5, 5)));
    }

    #[test]
    fn convergence_is_order_independent() {
        let events = vec![
            insert(0, 1, 'a', None),
            insert(1, 1, 'b', Some((0, 1))),
            insert(2, 1, 'c', None),
            delete(0, 1),
        ];

        let mut forward = CrdtDocument::new();
        for e in &events {
            forward.apply(e).unwrap();
        }

        // A different legal apply order: 'c' arrives before 'a'/'b', and
        // the delete still only runs once its target exists.
        let mut reversed = CrdtDocument::new();
        for e in [
            insert(2, 1, 'c', None),
            insert(0, 1, 'a', None),
            insert(1, 1, 'b', Some((0, 1))),
            delete(0, 1),
        ] {
            reversed.apply(&e).unwrap();
        }

        assert_eq!(forward.materialize(), reversed.materialize());
    }

    #[test]
    fn replaying_events_multiple_times_converges() {
        let events = vec![
            insert(0, 1, 'a', None),
            insert(1, 1, 'b', Some((0, 1))),
            delete(0, 1),
        ];
        let mut doc = CrdtDocument::new();
        for _ in 0..3 {
            for e in &events {
                doc.apply(e).unwrap();
            }
        }
        assert_eq!(doc.materialize(), "b");
    }
}
