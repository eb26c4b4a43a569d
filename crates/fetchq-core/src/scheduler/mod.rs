//! The fetch scheduler: per-host queueing on top of a [`TransferEngine`],
//! polled by the caller, reporting progress through [`FetchEvent`]s.
//!
//! Each host has at most one request transferring at a time. Later requests
//! for the same host wait in FIFO order behind it and take over its transfer
//! handle when it is cleaned up, so connections can be reused.

mod dispatch;
mod teardown;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use slotmap::SecondaryMap;

use crate::collab::Collaborators;
use crate::config::FetchSettings;
use crate::engine::{CurlEngine, TransferEngine, TransferId};
use crate::error::{EngineError, InvariantViolation, StartError};
use crate::registry::{FetchId, FetchTable};
use crate::request::{ExecState, FetchEvent, FetchRequest, FetchSpec};
use crate::url_model::HostKey;

/// Event callback of one fetch. It may call back into the scheduler to
/// start or abort fetches, including its own.
pub type FetchCallback<E> = Box<dyn FnMut(&mut Scheduler<E>, FetchId, FetchEvent<'_>)>;

pub struct Scheduler<E: TransferEngine = CurlEngine> {
    engine: E,
    settings: FetchSettings,
    collab: Collaborators,
    table: FetchTable,
    /// Taken out while the callback runs.
    callbacks: SecondaryMap<FetchId, FetchCallback<E>>,
    /// Transfer handle → owning request.
    owners: HashMap<TransferId, FetchId>,
    /// Promoted requests whose handle could not be reconfigured, with the
    /// engine's reason. They are reported and cleaned up by the next poll.
    start_failures: VecDeque<(FetchId, String)>,
    outstanding: bool,
    polling: bool,
}

impl<E: TransferEngine> Scheduler<E> {
    pub fn new(engine: E, settings: FetchSettings, collab: Collaborators) -> Self {
        Self {
            engine,
            settings,
            collab,
            table: FetchTable::new(),
            callbacks: SecondaryMap::new(),
            owners: HashMap::new(),
            start_failures: VecDeque::new(),
            outstanding: false,
            polling: false,
        }
    }

    /// Starts fetching `spec.url`, or queues it behind the transfer already
    /// running for the same host. Events are delivered to `callback` from
    /// later calls to [`Scheduler::poll`], never from `start` itself.
    pub fn start<F>(&mut self, spec: FetchSpec, callback: F) -> Result<FetchId, StartError>
    where
        F: FnMut(&mut Scheduler<E>, FetchId, FetchEvent<'_>) + 'static,
    {
        let url = url::Url::parse(&spec.url).map_err(|e| StartError::InvalidUrl {
            url: spec.url.clone(),
            reason: e.to_string(),
        })?;
        let host = HostKey::from_url(&url).map_err(|reason| StartError::InvalidUrl {
            url: spec.url.clone(),
            reason,
        })?;
        let mut request = FetchRequest::new(spec, url, host);

        let head = request
            .host
            .as_ref()
            .and_then(|host| self.table.find_host_head(host));
        let id = match head {
            Some(head) => {
                let id = self.table.insert(request);
                let tail = self.table.queue_tail(head);
                self.table.append_to_queue(tail, id);
                tracing::debug!(fetch = ?id, behind = ?tail, "queued {}", self.table[id].url);
                id
            }
            None => {
                let config = self.transfer_config(&request);
                let transfer = self.engine.create()?;
                let setup = self
                    .engine
                    .configure(transfer, &config)
                    .and_then(|()| self.engine.attach(transfer));
                if let Err(e) = setup {
                    self.engine.release(transfer);
                    return Err(e.into());
                }
                request.transfer = Some(transfer);
                let id = self.table.insert(request);
                self.table.link_front(id);
                self.owners.insert(transfer, id);
                tracing::debug!(fetch = ?id, "started {} on {}", self.table[id].url, transfer);
                id
            }
        };
        self.callbacks.insert(id, Box::new(callback));
        self.outstanding = true;
        self.debug_check();
        Ok(id)
    }

    /// Cancels a fetch without delivering any event. Stale ids are ignored.
    ///
    /// Called from the fetch's own callback, the abort takes effect once the
    /// callback returns.
    pub fn abort(&mut self, id: FetchId) {
        let Some(request) = self.table.get_mut(id) else {
            tracing::debug!(fetch = ?id, "abort of finished fetch ignored");
            return;
        };
        if request.exec != ExecState::Idle {
            request.exec = ExecState::PendingAbort;
            return;
        }
        tracing::debug!(fetch = ?id, "aborting {}", request.url);
        self.teardown(id);
        self.debug_check();
    }

    /// Drives the engine without blocking and delivers every event that is
    /// ready. A call from inside a callback is ignored.
    pub fn poll(&mut self) {
        if self.polling {
            tracing::warn!("nested poll from a fetch callback ignored");
            return;
        }
        self.polling = true;

        self.flush_start_failures();
        loop {
            match self.engine.perform() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!("transfer engine step failed: {}", e);
                    break;
                }
            }
        }
        while let Some(notice) = self.engine.next_notice() {
            self.dispatch(notice);
            self.debug_check();
        }
        self.flush_start_failures();

        if self.table.registry_is_empty() {
            self.outstanding = false;
        }
        self.polling = false;
        self.debug_check();
    }

    /// Blocks until the engine sees socket activity or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Result<(), EngineError> {
        self.engine.wait(timeout)
    }

    /// Whether any started fetch has not been cleaned up yet, as of the
    /// last `start` or `poll`.
    pub fn is_active(&self) -> bool {
        self.outstanding
    }

    pub fn contains(&self, id: FetchId) -> bool {
        self.table.contains(id)
    }

    /// Number of fetches transferring or queued.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Transfer handle held by `id`; `None` while it is queued.
    pub fn transfer_of(&self, id: FetchId) -> Option<TransferId> {
        self.table.get(id).and_then(|r| r.transfer)
    }

    pub fn is_queued(&self, id: FetchId) -> bool {
        self.table.get(id).is_some_and(|r| r.transfer.is_none())
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Verifies the registry and host-queue linkage and that every transfer
    /// handle is owned by exactly the request that holds it.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.table.check_invariants()?;
        for (&transfer, &id) in &self.owners {
            if self.transfer_of(id) != Some(transfer) {
                return Err(InvariantViolation(format!(
                    "{} is owned by {:?}, which does not hold it",
                    transfer, id
                )));
            }
        }
        let holding = self.table.active().count();
        if holding != self.owners.len() {
            return Err(InvariantViolation(format!(
                "{} transferring requests but {} owned handles",
                holding,
                self.owners.len()
            )));
        }
        Ok(())
    }

    /// Aborts whatever is still outstanding and hands back the engine.
    pub fn shutdown(mut self) -> E {
        if !self.table.is_empty() {
            tracing::warn!(
                "shutting down with {} unfinished fetches",
                self.table.len()
            );
        }
        // Queued requests first, so aborting a head does not promote them.
        let (queued, transferring): (Vec<FetchId>, Vec<FetchId>) = self
            .table
            .ids()
            .into_iter()
            .partition(|&id| self.is_queued(id));
        for id in queued.into_iter().chain(transferring) {
            self.abort(id);
        }
        self.engine
    }

    fn debug_check(&self) {
        if cfg!(debug_assertions) {
            if let Err(e) = self.check_invariants() {
                panic!("{}", e);
            }
        }
    }
}
