//! libcurl multi engine: one Easy2 handle per transfer, driven by a single
//! Multi. Handles leave the multi when detached and keep their connection
//! cache, so a handle reused for the next same-host fetch can skip setup.

mod configure;
mod handler;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use curl::easy::Easy2;
use curl::multi::{Easy2Handle, Multi};

use self::handler::{Captured, Collector};
use super::{EngineNotice, TransferConfig, TransferEngine, TransferId, TransferOutcome};
use crate::error::EngineError;

enum Slot {
    Idle(Easy2<Collector>),
    Attached(Easy2Handle<Collector>),
}

impl Slot {
    fn collector(&self) -> &Collector {
        match self {
            Slot::Idle(easy) => easy.get_ref(),
            Slot::Attached(handle) => handle.get_ref(),
        }
    }
}

pub struct CurlEngine {
    transfers: HashMap<TransferId, Slot>,
    multi: Multi,
    next_id: usize,
    notices: VecDeque<EngineNotice>,
}

impl CurlEngine {
    pub fn new() -> Self {
        curl::init();
        Self {
            transfers: HashMap::new(),
            multi: Multi::new(),
            next_id: 0,
            notices: VecDeque::new(),
        }
    }

    fn purge_notices(&mut self, transfer: TransferId) {
        self.notices.retain(|n| n.transfer() != transfer);
    }

    /// Takes an attached handle out of the multi, leaving it idle.
    fn unregister(&mut self, transfer: TransferId) -> Result<bool, EngineError> {
        match self.transfers.remove(&transfer) {
            Some(Slot::Attached(handle)) => {
                let mut easy = self.multi.remove2(handle)?;
                // Anything captured after the last drain belongs to a
                // response nobody will read.
                easy.get_mut().take_captured();
                self.transfers.insert(transfer, Slot::Idle(easy));
                Ok(true)
            }
            Some(idle) => {
                self.transfers.insert(transfer, idle);
                Ok(false)
            }
            None => Err(EngineError::UnknownTransfer(transfer)),
        }
    }

    fn drain_captured(&mut self) {
        let mut attached: Vec<TransferId> = self
            .transfers
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Attached(_)))
            .map(|(id, _)| *id)
            .collect();
        attached.sort();
        for transfer in attached {
            if let Some(Slot::Attached(handle)) = self.transfers.get_mut(&transfer) {
                for captured in handle.get_mut().take_captured() {
                    self.notices.push_back(match captured {
                        Captured::Header(line) => EngineNotice::Header { transfer, line },
                        Captured::Data(chunk) => EngineNotice::Data { transfer, chunk },
                    });
                }
            }
        }
    }
}

impl Default for CurlEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferEngine for CurlEngine {
    fn create(&mut self) -> Result<TransferId, EngineError> {
        let id = TransferId(self.next_id);
        self.next_id += 1;
        self.transfers
            .insert(id, Slot::Idle(Easy2::new(Collector::default())));
        tracing::trace!("{} created", id);
        Ok(id)
    }

    fn configure(&mut self, transfer: TransferId, config: &TransferConfig) -> Result<(), EngineError> {
        match self.transfers.get_mut(&transfer) {
            Some(Slot::Idle(easy)) => configure::apply(easy, config),
            Some(Slot::Attached(_)) => Err(EngineError::Attached(transfer)),
            None => Err(EngineError::UnknownTransfer(transfer)),
        }
    }

    fn attach(&mut self, transfer: TransferId) -> Result<(), EngineError> {
        match self.transfers.remove(&transfer) {
            Some(Slot::Idle(easy)) => {
                let mut handle = self.multi.add2(easy)?;
                handle.set_token(transfer.0)?;
                self.transfers.insert(transfer, Slot::Attached(handle));
                Ok(())
            }
            Some(attached) => {
                self.transfers.insert(transfer, attached);
                Err(EngineError::Attached(transfer))
            }
            None => Err(EngineError::UnknownTransfer(transfer)),
        }
    }

    fn detach(&mut self, transfer: TransferId) -> Result<(), EngineError> {
        self.purge_notices(transfer);
        self.unregister(transfer)?;
        Ok(())
    }

    fn release(&mut self, transfer: TransferId) {
        self.purge_notices(transfer);
        if let Some(Slot::Attached(handle)) = self.transfers.remove(&transfer) {
            if let Err(e) = self.multi.remove2(handle) {
                tracing::warn!("{} release: curl multi remove: {}", transfer, e);
            }
        }
        tracing::trace!("{} released", transfer);
    }

    fn cancel(&mut self, transfer: TransferId) {
        self.purge_notices(transfer);
        match self.unregister(transfer) {
            Ok(true) => self.notices.push_back(EngineNotice::Done {
                transfer,
                outcome: TransferOutcome::Cancelled,
            }),
            Ok(false) => tracing::debug!("{} cancel: not attached", transfer),
            Err(e) => {
                tracing::warn!("{} cancel: {}", transfer, e);
                self.notices.push_back(EngineNotice::Done {
                    transfer,
                    outcome: TransferOutcome::Cancelled,
                });
            }
        }
    }

    fn perform(&mut self) -> Result<bool, EngineError> {
        self.multi.perform()?;
        self.drain_captured();

        let mut finished: Vec<(usize, Result<(), curl::Error>)> = Vec::new();
        self.multi.messages(|msg| {
            if let (Ok(token), Some(result)) = (msg.token(), msg.result()) {
                finished.push((token, result));
            }
        });
        for (token, result) in finished {
            let transfer = TransferId(token);
            if !matches!(self.transfers.get(&transfer), Some(Slot::Attached(_))) {
                tracing::warn!("ignoring completion of unattached {}", transfer);
                continue;
            }
            let outcome = match result {
                Ok(()) => TransferOutcome::Completed,
                Err(e) => TransferOutcome::Failed(e.to_string()),
            };
            tracing::debug!("{} done: {:?}", transfer, outcome);
            self.notices.push_back(EngineNotice::Done { transfer, outcome });
        }
        Ok(false)
    }

    fn next_notice(&mut self) -> Option<EngineNotice> {
        self.notices.pop_front()
    }

    fn status(&self, transfer: TransferId) -> u32 {
        self.transfers
            .get(&transfer)
            .map(|slot| slot.collector().status)
            .unwrap_or(0)
    }

    fn content_type(&self, transfer: TransferId) -> Option<String> {
        self.transfers
            .get(&transfer)
            .and_then(|slot| slot.collector().content_type.clone())
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), EngineError> {
        self.multi.wait(&mut [], timeout)?;
        Ok(())
    }
}
