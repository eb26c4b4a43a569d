//! Event dispatch: engine notices in, callback events out.

use crate::engine::{EngineNotice, TransferEngine, TransferOutcome};
use crate::error::InvariantViolation;
use crate::intake::{self, Resolution, StatusInput};
use crate::registry::FetchId;
use crate::request::{ExecState, FetchEvent, Phase, ResponseMeta};

use super::{FetchCallback, Scheduler};

/// What the callback asked for while handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Delivery {
    Continue,
    AbortRequested,
}

/// Outcome of status resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Accepted,
    Rejected,
    /// The client aborted from inside the event; the request is gone.
    TornDown,
}

impl<E: TransferEngine> Scheduler<E> {
    pub(super) fn dispatch(&mut self, notice: EngineNotice) {
        let transfer = notice.transfer();
        let Some(&id) = self.owners.get(&transfer) else {
            panic!(
                "{}",
                InvariantViolation(format!("engine notice for {} with no owning fetch", transfer))
            );
        };
        match notice {
            EngineNotice::Header { line, .. } => self.on_header(id, &line),
            EngineNotice::Data { chunk, .. } => self.on_data(id, &chunk),
            EngineNotice::Done { outcome, .. } => self.on_done(id, outcome),
        }
    }

    /// Runs the callback of `id` with the request marked as inside its own
    /// callback, so an `abort` of itself is deferred until it returns.
    pub(super) fn deliver(&mut self, id: FetchId, event: FetchEvent<'_>) -> Delivery {
        match self.table.get_mut(id) {
            Some(request) => request.exec = ExecState::InCallback,
            None => return Delivery::AbortRequested,
        }
        let Some(mut callback) = self.callbacks.remove(id) else {
            if let Some(request) = self.table.get_mut(id) {
                request.exec = ExecState::Idle;
            }
            return Delivery::Continue;
        };

        tracing::debug!(fetch = ?id, "{}", event);
        callback(self, id, event);

        let Some(request) = self.table.get_mut(id) else {
            return Delivery::AbortRequested;
        };
        let pending = request.exec == ExecState::PendingAbort;
        request.exec = ExecState::Idle;
        self.callbacks.insert(id, callback);
        if pending {
            Delivery::AbortRequested
        } else {
            Delivery::Continue
        }
    }

    /// Delivers the last event of a request that has already been cleaned
    /// up. Aborting `id` from here is a no-op.
    fn deliver_final(&mut self, mut callback: FetchCallback<E>, id: FetchId, event: FetchEvent<'_>) {
        tracing::debug!(fetch = ?id, "{}", event);
        callback(self, id, event);
    }

    fn on_header(&mut self, id: FetchId, line: &[u8]) {
        let http_auth = self.settings.http_auth;
        let Some(request) = self.table.get_mut(id) else {
            return;
        };
        if request.phase != Phase::Running {
            return;
        }
        if line.starts_with(b"HTTP/") {
            // A new response after 1xx or an authentication round.
            request.meta = ResponseMeta::default();
        } else {
            intake::absorb_header(&mut request.meta, line, http_auth);
        }
    }

    fn on_data(&mut self, id: FetchId, chunk: &[u8]) {
        let Some(phase) = self.table.get(id).map(|r| r.phase) else {
            return;
        };
        match phase {
            Phase::Rejected => return,
            Phase::Running => {
                if self.resolve_status(id, false) != Verdict::Accepted {
                    return;
                }
            }
            Phase::Accepted => {}
        }
        if self.deliver(id, FetchEvent::Data(chunk)) == Delivery::AbortRequested {
            self.teardown(id);
        }
    }

    fn on_done(&mut self, id: FetchId, outcome: TransferOutcome) {
        let Some(phase) = self.table.get(id).map(|r| r.phase) else {
            return;
        };
        match outcome {
            TransferOutcome::Cancelled => {
                self.teardown(id);
            }
            TransferOutcome::Failed(text) => {
                if phase != Phase::Rejected {
                    tracing::debug!(fetch = ?id, "transfer failed: {}", text);
                    self.deliver(id, FetchEvent::Error(&text));
                }
                self.teardown(id);
            }
            TransferOutcome::Completed => {
                let finished = match phase {
                    Phase::Running => self.resolve_status(id, true) == Verdict::Accepted,
                    Phase::Accepted => true,
                    Phase::Rejected => false,
                };
                if let Some(callback) = self.teardown(id) {
                    if finished {
                        self.deliver_final(callback, id, FetchEvent::Finished);
                    }
                }
            }
        }
    }

    /// Decides once what the response means for the client and tells it.
    /// A rejected transfer that is still running is cancelled.
    fn resolve_status(&mut self, id: FetchId, completed: bool) -> Verdict {
        let Some(request) = self.table.get(id) else {
            return Verdict::TornDown;
        };
        let transfer = request.transfer;
        let status = transfer.map(|t| self.engine.status(t)).unwrap_or(0);
        let content_type = transfer.and_then(|t| self.engine.content_type(t));
        let input = StatusInput {
            status,
            url: &request.url,
            meta: &request.meta,
            only_2xx: request.only_2xx,
            http_auth: self.settings.http_auth,
            content_type: content_type.as_deref(),
        };
        let resolution = intake::resolve(
            &input,
            self.collab.filetypes.as_ref(),
            self.collab.messages.as_ref(),
        );
        tracing::debug!(fetch = ?id, status, "resolved {:?}", resolution);

        let rejected = resolution.rejects();
        if let Some(request) = self.table.get_mut(id) {
            request.phase = if rejected {
                Phase::Rejected
            } else {
                Phase::Accepted
            };
        }

        let delivery = match resolution {
            Resolution::Redirect(ref target) => self.deliver(id, FetchEvent::Redirect(target)),
            Resolution::Auth(ref realm) => self.deliver(id, FetchEvent::Auth { realm }),
            Resolution::PolicyError(ref text) => self.deliver(id, FetchEvent::Error(text)),
            Resolution::Accept {
                ref mime,
                content_length,
            } => self.deliver(
                id,
                FetchEvent::Type {
                    mime,
                    content_length,
                },
            ),
        };

        if delivery == Delivery::AbortRequested {
            self.teardown(id);
            return Verdict::TornDown;
        }
        if !rejected {
            return Verdict::Accepted;
        }
        if !completed {
            if let Some(t) = transfer {
                self.engine.cancel(t);
            }
        }
        Verdict::Rejected
    }

    /// Reports promotions that could not be set up, then cleans them up
    /// (which promotes the next request on the host in turn).
    pub(super) fn flush_start_failures(&mut self) {
        while let Some((id, reason)) = self.start_failures.pop_front() {
            if !self.table.contains(id) {
                continue;
            }
            self.deliver(id, FetchEvent::Error(&reason));
            self.teardown(id);
        }
    }
}
