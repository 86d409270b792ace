use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::error::{BigCountError, Result};
use crate::types::Rank;

/// Matching key of a message: communicator context, sender and tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MsgKey {
    pub context: u32,
    pub source: Rank,
    pub tag: i32,
}

/// Per-rank inbox. Messages with equal keys are delivered in send order.
pub(crate) struct Mailbox {
    queues: Mutex<HashMap<MsgKey, VecDeque<Vec<u8>>>>,
    arrived: Notify,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            arrived: Notify::new(),
        }
    }

    pub fn deliver(&self, key: MsgKey, payload: Vec<u8>) -> Result<()> {
        self.queues
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("mailbox"))?
            .entry(key)
            .or_default()
            .push_back(payload);
        self.arrived.notify_waiters();
        Ok(())
    }

    pub async fn take(&self, key: MsgKey) -> Result<Vec<u8>> {
        loop {
            // Register interest before checking so a delivery between the
            // check and the await is not missed.
            let mut notified = std::pin::pin!(self.arrived.notified());
            notified.as_mut().enable();
            if let Some(payload) = self.try_take(key)? {
                return Ok(payload);
            }
            notified.await;
        }
    }

    fn try_take(&self, key: MsgKey) -> Result<Option<Vec<u8>>> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("mailbox"))?;
        let Some(queue) = queues.get_mut(&key) else {
            return Ok(None);
        };
        let payload = queue.pop_front();
        if queue.is_empty() {
            queues.remove(&key);
        }
        Ok(payload)
    }

    pub fn pending(&self) -> Result<usize> {
        Ok(self
            .queues
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("mailbox"))?
            .values()
            .map(VecDeque::len)
            .sum())
    }
}
