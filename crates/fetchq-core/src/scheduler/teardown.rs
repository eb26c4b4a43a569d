//! Cleanup of finished or aborted requests and promotion of the next
//! request queued on the same host.

use crate::engine::{TransferConfig, TransferEngine, TransferId, SUPPRESSED_DEFAULT_HEADERS};
use crate::registry::FetchId;
use crate::request::FetchRequest;

use super::{FetchCallback, Scheduler};

impl<E: TransferEngine> Scheduler<E> {
    /// Unlinks `id` from both orderings, hands its transfer to the next
    /// request queued on its host (or releases it) and frees the request.
    /// Returns the callback so a final event can still be delivered.
    pub(super) fn teardown(&mut self, id: FetchId) -> Option<FetchCallback<E>> {
        let request = self.table.get(id)?;
        let transfer = request.transfer;
        let successor = request.links.queue_next;

        self.table.unlink_active(id);
        if let Some(t) = transfer {
            self.owners.remove(&t);
            if let Err(e) = self.engine.detach(t) {
                tracing::warn!(fetch = ?id, "detach {}: {}", t, e);
            }
        }
        self.table.splice_out_of_queue(id);

        match (transfer, successor) {
            (Some(t), Some(next)) => self.promote(next, t),
            (Some(t), None) => self.engine.release(t),
            // A queued request owns nothing.
            (None, _) => {}
        }

        let request = self.table.remove(id)?;
        tracing::debug!(fetch = ?id, "cleaned up {}", request.url);
        self.callbacks.remove(id)
    }

    /// Gives `transfer` to `next`, which must already be spliced to the
    /// front of its host queue. A configuration failure is reported to
    /// `next` as an error on the following poll.
    fn promote(&mut self, next: FetchId, transfer: TransferId) {
        let Some(request) = self.table.get(next) else {
            self.engine.release(transfer);
            return;
        };
        let config = self.transfer_config(request);
        tracing::info!(fetch = ?next, "promoting {} onto {}", request.url, transfer);

        if let Some(request) = self.table.get_mut(next) {
            request.transfer = Some(transfer);
        }
        self.table.link_front(next);
        self.owners.insert(transfer, next);

        let setup = self
            .engine
            .configure(transfer, &config)
            .and_then(|()| self.engine.attach(transfer));
        if let Err(e) = setup {
            tracing::warn!(fetch = ?next, "could not reuse {}: {}", transfer, e);
            self.start_failures.push_back((next, e.to_string()));
        }
    }

    pub(super) fn transfer_config(&self, request: &FetchRequest) -> TransferConfig {
        let settings = &self.settings;
        let credentials = if settings.http_auth {
            self.collab.credentials.lookup(request.url.as_str())
        } else {
            None
        };
        TransferConfig {
            url: request.url.to_string(),
            referer: request.referer.clone(),
            user_agent: settings.user_agent.clone(),
            headers: SUPPRESSED_DEFAULT_HEADERS
                .iter()
                .map(|h| h.to_string())
                .collect(),
            proxy: settings
                .proxy
                .as_ref()
                .map(|p| (p.host.clone(), p.port)),
            credentials,
            body: request.body.clone(),
            cookie_jar: if request.cookies {
                settings.cookie_jar.clone()
            } else {
                None
            },
            connect_timeout: settings.connect_timeout,
            low_speed_limit: settings.low_speed_limit,
            low_speed_time: settings.low_speed_time,
            verbose: settings.verbose,
        }
    }
}
