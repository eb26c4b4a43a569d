//! In-memory transfer engine that replays scripted responses by URL.
//!
//! Each attached transfer plays its whole script (status line, headers, body
//! chunks, completion) on the next `perform`, in transfer id order. Every
//! engine call is recorded so tests can assert handle reuse and cleanup.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use fetchq_core::engine::{
    EngineNotice, TransferConfig, TransferEngine, TransferId, TransferOutcome,
};
use fetchq_core::EngineError;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u32,
    pub content_type: Option<String>,
    pub headers: Vec<String>,
    pub chunks: Vec<Vec<u8>>,
    pub outcome: TransferOutcome,
}

impl Response {
    pub fn status(status: u32) -> Self {
        Self {
            status,
            content_type: None,
            headers: Vec::new(),
            chunks: Vec::new(),
            outcome: TransferOutcome::Completed,
        }
    }

    /// 200 with a Content-Type and a body delivered as one chunk.
    pub fn ok(content_type: &str, body: &str) -> Self {
        Self::status(200)
            .content_type(content_type)
            .header(&format!("Content-Length: {}", body.len()))
            .chunk(body)
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self.headers.push(format!("Content-Type: {}", content_type));
        self
    }

    pub fn header(mut self, line: &str) -> Self {
        self.headers.push(line.to_string());
        self
    }

    pub fn chunk(mut self, data: &str) -> Self {
        self.chunks.push(data.as_bytes().to_vec());
        self
    }

    pub fn fails_with(mut self, text: &str) -> Self {
        self.outcome = TransferOutcome::Failed(text.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create(TransferId),
    Configure(TransferId, String),
    Attach(TransferId),
    Detach(TransferId),
    Release(TransferId),
    Cancel(TransferId),
}

#[derive(Debug, Default)]
struct Transfer {
    config: Option<TransferConfig>,
    attached: bool,
    /// Attached but script not yet played.
    fresh: bool,
    status: u32,
    content_type: Option<String>,
}

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    responses: HashMap<String, Response>,
    fail_configure: HashSet<String>,
    transfers: BTreeMap<TransferId, Transfer>,
    next_id: usize,
    notices: VecDeque<EngineNotice>,
    pub log: Vec<Op>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, response: Response) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    /// Makes every `configure` for `url` fail.
    pub fn fail_configure_for(mut self, url: &str) -> Self {
        self.fail_configure.insert(url.to_string());
        self
    }

    pub fn config(&self, transfer: TransferId) -> Option<&TransferConfig> {
        self.transfers.get(&transfer)?.config.as_ref()
    }

    pub fn live_transfers(&self) -> usize {
        self.transfers.len()
    }

    pub fn attached(&self) -> Vec<TransferId> {
        self.transfers
            .iter()
            .filter(|(_, t)| t.attached)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.log.iter().filter(|op| pred(op)).count()
    }

    fn purge(&mut self, transfer: TransferId) {
        self.notices.retain(|n| n.transfer() != transfer);
    }

    fn play(&mut self, id: TransferId) {
        let url = match self.transfers.get(&id).and_then(|t| t.config.as_ref()) {
            Some(cfg) => cfg.url.clone(),
            None => return,
        };
        let Some(response) = self.responses.get(&url).cloned() else {
            self.notices.push_back(EngineNotice::Done {
                transfer: id,
                outcome: TransferOutcome::Failed(format!("no scripted response for {}", url)),
            });
            return;
        };
        if let Some(t) = self.transfers.get_mut(&id) {
            t.status = response.status;
            t.content_type = response.content_type.clone();
        }
        if response.status != 0 {
            self.notices.push_back(EngineNotice::Header {
                transfer: id,
                line: format!("HTTP/1.1 {} Scripted\r\n", response.status).into_bytes(),
            });
        }
        for h in &response.headers {
            self.notices.push_back(EngineNotice::Header {
                transfer: id,
                line: format!("{}\r\n", h).into_bytes(),
            });
        }
        for chunk in response.chunks {
            self.notices.push_back(EngineNotice::Data {
                transfer: id,
                chunk,
            });
        }
        self.notices.push_back(EngineNotice::Done {
            transfer: id,
            outcome: response.outcome,
        });
    }
}

impl TransferEngine for ScriptedEngine {
    fn create(&mut self) -> Result<TransferId, EngineError> {
        let id = TransferId(self.next_id);
        self.next_id += 1;
        self.transfers.insert(id, Transfer::default());
        self.log.push(Op::Create(id));
        Ok(id)
    }

    fn configure(&mut self, transfer: TransferId, config: &TransferConfig) -> Result<(), EngineError> {
        self.log.push(Op::Configure(transfer, config.url.clone()));
        if self.fail_configure.contains(&config.url) {
            return Err(EngineError::Other(format!("cannot configure {}", config.url)));
        }
        let t = self
            .transfers
            .get_mut(&transfer)
            .ok_or(EngineError::UnknownTransfer(transfer))?;
        if t.attached {
            return Err(EngineError::Attached(transfer));
        }
        t.config = Some(config.clone());
        t.status = 0;
        t.content_type = None;
        Ok(())
    }

    fn attach(&mut self, transfer: TransferId) -> Result<(), EngineError> {
        let t = self
            .transfers
            .get_mut(&transfer)
            .ok_or(EngineError::UnknownTransfer(transfer))?;
        if t.attached {
            return Err(EngineError::Attached(transfer));
        }
        t.attached = true;
        t.fresh = true;
        self.log.push(Op::Attach(transfer));
        Ok(())
    }

    fn detach(&mut self, transfer: TransferId) -> Result<(), EngineError> {
        self.purge(transfer);
        let t = self
            .transfers
            .get_mut(&transfer)
            .ok_or(EngineError::UnknownTransfer(transfer))?;
        if t.attached {
            t.attached = false;
            t.fresh = false;
            self.log.push(Op::Detach(transfer));
        }
        Ok(())
    }

    fn release(&mut self, transfer: TransferId) {
        self.purge(transfer);
        if self.transfers.remove(&transfer).is_some() {
            self.log.push(Op::Release(transfer));
        }
    }

    fn cancel(&mut self, transfer: TransferId) {
        self.purge(transfer);
        self.log.push(Op::Cancel(transfer));
        if let Some(t) = self.transfers.get_mut(&transfer) {
            t.attached = false;
            t.fresh = false;
        }
        self.notices.push_back(EngineNotice::Done {
            transfer,
            outcome: TransferOutcome::Cancelled,
        });
    }

    fn perform(&mut self) -> Result<bool, EngineError> {
        let fresh: Vec<TransferId> = self
            .transfers
            .iter_mut()
            .filter(|(_, t)| t.fresh)
            .map(|(id, t)| {
                t.fresh = false;
                *id
            })
            .collect();
        for id in fresh {
            self.play(id);
        }
        Ok(false)
    }

    fn next_notice(&mut self) -> Option<EngineNotice> {
        self.notices.pop_front()
    }

    fn status(&self, transfer: TransferId) -> u32 {
        self.transfers.get(&transfer).map(|t| t.status).unwrap_or(0)
    }

    fn content_type(&self, transfer: TransferId) -> Option<String> {
        self.transfers.get(&transfer)?.content_type.clone()
    }

    fn wait(&mut self, _timeout: Duration) -> Result<(), EngineError> {
        Ok(())
    }
}
