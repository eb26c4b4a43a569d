//! Request table with the two orderings the scheduler maintains over it:
//! the active registry (every fetch that owns a transfer, most recent first)
//! and the per-host FIFO queues.
//!
//! Links are stored as [`FetchId`]s on each request, so a removed request can
//! never be reached through a stale reference: lookups of a stale id fail.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::error::InvariantViolation;
use crate::request::FetchRequest;
use crate::url_model::HostKey;

slotmap::new_key_type! {
    /// Opaque handle of a started fetch. Becomes stale once the fetch has
    /// been cleaned up; operations on a stale handle are no-ops.
    pub struct FetchId;
}

/// Linkage of one request into the active registry and its host queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Links {
    /// Member of the active registry.
    pub active: bool,
    pub prev: Option<FetchId>,
    pub next: Option<FetchId>,
    pub queue_prev: Option<FetchId>,
    pub queue_next: Option<FetchId>,
}

#[derive(Debug, Default)]
pub(crate) struct FetchTable {
    requests: SlotMap<FetchId, FetchRequest>,
    head: Option<FetchId>,
}

impl FetchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn get(&self, id: FetchId) -> Option<&FetchRequest> {
        self.requests.get(id)
    }

    pub fn get_mut(&mut self, id: FetchId) -> Option<&mut FetchRequest> {
        self.requests.get_mut(id)
    }

    pub fn contains(&self, id: FetchId) -> bool {
        self.requests.contains_key(id)
    }

    pub fn ids(&self) -> Vec<FetchId> {
        self.requests.keys().collect()
    }

    /// Adds an unlinked request.
    pub fn insert(&mut self, request: FetchRequest) -> FetchId {
        self.requests.insert(request)
    }

    /// Drops a request. Callers unlink it from both orderings first.
    pub fn remove(&mut self, id: FetchId) -> Option<FetchRequest> {
        self.requests.remove(id)
    }

    pub fn registry_is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Active registry from the most recently linked request.
    pub fn active(&self) -> ActiveIter<'_> {
        ActiveIter {
            table: self,
            cursor: self.head,
        }
    }

    pub fn link_front(&mut self, id: FetchId) {
        let old_head = self.head;
        let Some(req) = self.requests.get_mut(id) else {
            return;
        };
        if req.links.active {
            return;
        }
        req.links.active = true;
        req.links.prev = None;
        req.links.next = old_head;
        if let Some(h) = old_head.and_then(|h| self.requests.get_mut(h)) {
            h.links.prev = Some(id);
        }
        self.head = Some(id);
    }

    pub fn unlink_active(&mut self, id: FetchId) {
        let Some(req) = self.requests.get_mut(id) else {
            return;
        };
        if !req.links.active {
            return;
        }
        let (prev, next) = (req.links.prev, req.links.next);
        req.links.active = false;
        req.links.prev = None;
        req.links.next = None;
        match prev.and_then(|p| self.requests.get_mut(p)) {
            Some(p) => p.links.next = next,
            None => self.head = next,
        }
        if let Some(n) = next.and_then(|n| self.requests.get_mut(n)) {
            n.links.prev = prev;
        }
    }

    /// The active request for `host`, i.e. the head of that host's queue.
    pub fn find_host_head(&self, host: &HostKey) -> Option<FetchId> {
        self.active()
            .find(|&id| self.requests[id].host.as_ref() == Some(host))
    }

    pub fn queue_tail(&self, head: FetchId) -> FetchId {
        let mut tail = head;
        while let Some(next) = self.requests.get(tail).and_then(|r| r.links.queue_next) {
            tail = next;
        }
        tail
    }

    pub fn append_to_queue(&mut self, tail: FetchId, id: FetchId) {
        if let Some(t) = self.requests.get_mut(tail) {
            t.links.queue_next = Some(id);
        }
        if let Some(r) = self.requests.get_mut(id) {
            r.links.queue_prev = Some(tail);
            r.links.queue_next = None;
        }
    }

    /// Removes `id` from its host queue, joining its neighbours. A successor
    /// of the queue head becomes the new head (no `queue_prev`).
    pub fn splice_out_of_queue(&mut self, id: FetchId) {
        let Some(req) = self.requests.get_mut(id) else {
            return;
        };
        let (prev, next) = (req.links.queue_prev, req.links.queue_next);
        req.links.queue_prev = None;
        req.links.queue_next = None;
        if let Some(p) = prev.and_then(|p| self.requests.get_mut(p)) {
            p.links.queue_next = next;
        }
        if let Some(n) = next.and_then(|n| self.requests.get_mut(n)) {
            n.links.queue_prev = prev;
        }
    }

    /// Checks both orderings:
    /// - every request is transferring exactly when it has no queue
    ///   predecessor, and exactly the transferring requests are in the
    ///   active registry;
    /// - each host has one queue, headed by its only transferring request.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let fail = |msg: String| Err(InvariantViolation(msg));

        for (id, req) in &self.requests {
            let heads_queue = req.links.queue_prev.is_none();
            if heads_queue != req.transfer.is_some() {
                return fail(format!(
                    "{:?} ({}) has queue_prev={:?} but transfer={:?}",
                    id, req.url, req.links.queue_prev, req.transfer
                ));
            }
            if req.links.active != req.transfer.is_some() {
                return fail(format!("{:?} ({}) registry membership mismatch", id, req.url));
            }
            if let Some(n) = req.links.queue_next {
                match self.requests.get(n) {
                    Some(next) if next.links.queue_prev == Some(id) => {
                        if next.host != req.host {
                            return fail(format!("{:?} queued behind a different host", n));
                        }
                    }
                    _ => return fail(format!("{:?} queue_next link is not mirrored", id)),
                }
            }
            if let Some(p) = req.links.queue_prev {
                if self.requests.get(p).and_then(|r| r.links.queue_next) != Some(id) {
                    return fail(format!("{:?} queue_prev link is not mirrored", id));
                }
            }
        }

        let mut seen = 0usize;
        let mut prev = None;
        let mut hosts: HashMap<&HostKey, FetchId> = HashMap::new();
        for id in self.active() {
            let req = &self.requests[id];
            if req.links.prev != prev {
                return fail(format!("{:?} registry prev link is not mirrored", id));
            }
            if let Some(host) = req.host.as_ref() {
                if let Some(other) = hosts.insert(host, id) {
                    return fail(format!(
                        "{:?} and {:?} are both transferring for host {}",
                        other, id, host
                    ));
                }
            }
            prev = Some(id);
            seen += 1;
            if seen > self.requests.len() {
                return fail("active registry contains a cycle".to_string());
            }
        }
        let active_count = self.requests.values().filter(|r| r.links.active).count();
        if seen != active_count {
            return fail(format!(
                "registry reaches {} requests but {} are marked active",
                seen, active_count
            ));
        }
        Ok(())
    }
}

impl std::ops::Index<FetchId> for FetchTable {
    type Output = FetchRequest;

    fn index(&self, id: FetchId) -> &FetchRequest {
        &self.requests[id]
    }
}

pub(crate) struct ActiveIter<'a> {
    table: &'a FetchTable,
    cursor: Option<FetchId>,
}

impl Iterator for ActiveIter<'_> {
    type Item = FetchId;

    fn next(&mut self) -> Option<FetchId> {
        let id = self.cursor?;
        self.cursor = self.table.requests.get(id).and_then(|r| r.links.next);
        Some(id)
    }
}
