//! In-process reference transport.
//!
//! [`LocalWorld`] bootstraps `N` ranks inside one process that share a
//! datatype registry, per-rank mailboxes, a barrier and a window registry.
//! Each rank is a [`LocalTransport`] driven from its own task. The native
//! count limit is configurable so that tests can exercise the large-count
//! paths with small buffers.

mod mailbox;
mod memory;
mod transport;
mod types;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{BigCountError, Result};
use crate::transport::UserFunction;
use crate::types::{Aint, Count, Rank, ReduceOp};

use mailbox::Mailbox;
use types::TypeRegistry;

pub use types::LocalDatatype;

/// Builder for a set of connected in-process ranks.
#[derive(Debug, Clone)]
pub struct LocalWorld {
    size: u32,
    native_max: Count,
    inter: bool,
}

impl LocalWorld {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            native_max: i32::MAX as Count,
            inter: false,
        }
    }

    /// Largest count a single native call accepts.
    pub fn native_max(mut self, native_max: Count) -> Self {
        self.native_max = native_max;
        self
    }

    /// Report every rank as a member of an inter-communicator.
    pub fn intercommunicator(mut self, inter: bool) -> Self {
        self.inter = inter;
        self
    }

    pub fn bootstrap(self) -> Result<Vec<LocalTransport>> {
        if self.size == 0 {
            return Err(BigCountError::transport("world size must be at least 1"));
        }
        if self.native_max == 0 || self.native_max > i32::MAX as Count {
            return Err(BigCountError::transport(format!(
                "native_max must be in 1..={}, got {}",
                i32::MAX,
                self.native_max
            )));
        }

        let shared = Arc::new(LocalShared {
            types: TypeRegistry::new(),
            mailboxes: (0..self.size).map(|_| Mailbox::new()).collect(),
            barrier: tokio::sync::Barrier::new(self.size as usize),
            windows: Mutex::new(HashMap::new()),
            accumulate_lock: Mutex::new(()),
            ops: Mutex::new(HashMap::new()),
            next_op: AtomicU32::new(1),
        });

        tracing::debug!(
            size = self.size,
            native_max = self.native_max,
            "bootstrapped local world"
        );

        Ok((0..self.size)
            .map(|rank| LocalTransport {
                rank,
                size: self.size,
                native_max: self.native_max,
                inter: self.inter,
                shared: Arc::clone(&shared),
                graph_seq: AtomicU32::new(0),
                window_seq: AtomicU64::new(0),
            })
            .collect())
    }

    /// Bootstrap a one-rank world and return its only rank.
    pub fn single(self) -> Result<LocalTransport> {
        if self.size != 1 {
            return Err(BigCountError::transport(format!(
                "single() needs a world of size 1, got {}",
                self.size
            )));
        }
        self.bootstrap()?
            .pop()
            .ok_or_else(|| BigCountError::transport("empty world"))
    }
}

/// Exposed region of one rank in one window.
#[derive(Debug, Clone, Copy)]
struct WindowSlot {
    base: u64,
    size: Aint,
    disp_unit: i32,
}

struct LocalShared {
    types: TypeRegistry,
    mailboxes: Vec<Mailbox>,
    barrier: tokio::sync::Barrier,
    windows: Mutex<HashMap<(u64, Rank), WindowSlot>>,
    /// Serializes read-modify-write accumulates across ranks.
    accumulate_lock: Mutex<()>,
    ops: Mutex<HashMap<u32, UserFunction<LocalTransport>>>,
    next_op: AtomicU32,
}

/// Graph communicator of the local transport.
#[derive(Debug, Clone)]
pub struct LocalGraph {
    context: u32,
    sources: Vec<Rank>,
    destinations: Vec<Rank>,
}

/// One-sided window of the local transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalWindow {
    id: u64,
}

/// Reduction operator of the local transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOp {
    Builtin(ReduceOp),
    User(u32),
}

/// Pending operation of the local transport. Sends complete eagerly.
#[derive(Debug)]
pub enum LocalRequest {
    Complete,
    Recv(PendingRecv),
}

#[derive(Debug)]
pub struct PendingRecv {
    key: mailbox::MsgKey,
    addr: u64,
    count: usize,
    layout: types::Layout,
}

/// One rank of a [`LocalWorld`].
pub struct LocalTransport {
    rank: Rank,
    size: u32,
    native_max: Count,
    inter: bool,
    shared: Arc<LocalShared>,
    graph_seq: AtomicU32,
    window_seq: AtomicU64,
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("native_max", &self.native_max)
            .finish_non_exhaustive()
    }
}

impl LocalTransport {
    /// Number of derived datatypes currently allocated across the world.
    pub fn live_datatypes(&self) -> usize {
        self.shared.types.live().unwrap_or(0)
    }

    /// Messages delivered to this rank and not yet received.
    pub fn pending_messages(&self) -> usize {
        self.shared.mailboxes[self.rank as usize]
            .pending()
            .unwrap_or(0)
    }

    /// User-defined reduction operators currently registered.
    pub fn live_ops(&self) -> usize {
        self.shared.ops.lock().map(|ops| ops.len()).unwrap_or(0)
    }

    /// Windows this rank currently exposes.
    pub fn live_windows(&self) -> usize {
        self.shared
            .windows
            .lock()
            .map(|w| w.keys().filter(|(_, r)| *r == self.rank).count())
            .unwrap_or(0)
    }

    fn next_graph_context(&self) -> u32 {
        GRAPH_CONTEXT_BASE + self.graph_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn next_window_id(&self) -> u64 {
        self.window_seq.fetch_add(1, Ordering::Relaxed)
    }
}

const CONTEXT_P2P: u32 = 0;
const CONTEXT_COLLECTIVE: u32 = 1;
const GRAPH_CONTEXT_BASE: u32 = 16;

const TAG_REDUCE: i32 = 1;
const TAG_BCAST: i32 = 2;
const TAG_SCATTER: i32 = 3;
