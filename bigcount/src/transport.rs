//! Native-count communicator interface.
//!
//! [`Transport`] is the message-passing runtime this crate extends. Every
//! count it accepts is an `i32` no larger than
//! [`native_max`](crate::datatype::TypeSystem::native_max); the wide-count
//! layer only ever hands it composed datatypes with count 0 or 1, or counts
//! it has checked against the limit.
//!
//! Buffer addresses are raw `u64` pointers, as with a device adapter. Every
//! method that touches memory is `unsafe`.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::datatype::TypeSystem;
use crate::error::Result;
use crate::topology::GraphTopology;
use crate::types::{Aint, NativeBuf, NativeTarget, Rank, ReduceOp, SendBuf};

/// One entry of a neighbor exchange: `count` items of `datatype` located
/// `displacement` bytes from the buffer start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborBlock<H> {
    pub count: i32,
    pub displacement: Aint,
    pub datatype: H,
}

/// User reduction callback: `inout[i] = f(in[i], inout[i])` over `len` items
/// of the given datatype, addressed by raw pointers `(in, inout)`.
pub type UserFunction<T> =
    Arc<dyn Fn(&T, u64, u64, i32, <T as TypeSystem>::Datatype) -> Result<()> + Send + Sync>;

/// A communicator of a message-passing runtime.
pub trait Transport: TypeSystem + Sized + 'static {
    type Graph: Send + Sync;
    type Window: Send + Sync;
    type Op: Copy + std::fmt::Debug + Send + Sync;
    type Request: Send;

    fn rank(&self) -> Rank;
    fn size(&self) -> u32;
    fn is_inter(&self) -> bool;

    /// Collectively create a communicator with a directed graph topology.
    fn create_graph<'a>(&'a self, topology: &'a GraphTopology) -> BoxFuture<'a, Result<Self::Graph>>;

    fn free_graph(&self, graph: &Self::Graph) -> Result<()>;

    /// Generalized neighbor all-to-all over `graph`.
    ///
    /// `send` has one block per destination and `recv` one block per source,
    /// in topology order. Displacements are in bytes.
    ///
    /// # Safety
    /// Every block must describe valid memory relative to its base pointer.
    unsafe fn neighbor_alltoallw<'a>(
        &'a self,
        graph: &'a Self::Graph,
        send_ptr: u64,
        send: &'a [NeighborBlock<Self::Datatype>],
        recv_ptr: u64,
        recv: &'a [NeighborBlock<Self::Datatype>],
    ) -> BoxFuture<'a, Result<()>>;

    /// # Safety
    /// `buf` must stay valid until the request completes.
    unsafe fn isend(
        &self,
        buf: NativeBuf<Self::Datatype>,
        dest: Rank,
        tag: i32,
    ) -> Result<Self::Request>;

    /// # Safety
    /// `buf` must stay valid and unaliased until the request completes.
    unsafe fn irecv(
        &self,
        buf: NativeBuf<Self::Datatype>,
        source: Rank,
        tag: i32,
    ) -> Result<Self::Request>;

    fn wait(&self, request: Self::Request) -> BoxFuture<'_, Result<()>>;

    /// Complete every request, returning the first failure.
    fn wait_all(&self, requests: Vec<Self::Request>) -> BoxFuture<'_, Result<()>>;

    fn builtin_op(&self, op: ReduceOp) -> Self::Op;

    fn op_create(&self, function: UserFunction<Self>, commute: bool) -> Result<Self::Op>;

    fn op_free(&self, op: Self::Op) -> Result<()>;

    /// `inout = op(in, inout)` on local memory.
    ///
    /// # Safety
    /// Both pointers must hold `count` items of `datatype`.
    unsafe fn reduce_local(
        &self,
        in_ptr: u64,
        inout_ptr: u64,
        count: i32,
        datatype: Self::Datatype,
        op: Self::Op,
    ) -> Result<()>;

    /// # Safety
    /// Buffers must hold `count` items of `datatype`; `recv_ptr` only at root.
    unsafe fn reduce<'a>(
        &'a self,
        send: SendBuf,
        recv_ptr: u64,
        count: i32,
        datatype: Self::Datatype,
        op: Self::Op,
        root: Rank,
    ) -> BoxFuture<'a, Result<()>>;

    /// # Safety
    /// Buffers must hold `count` items of `datatype`.
    unsafe fn allreduce<'a>(
        &'a self,
        send: SendBuf,
        recv_ptr: u64,
        count: i32,
        datatype: Self::Datatype,
        op: Self::Op,
    ) -> BoxFuture<'a, Result<()>>;

    /// Root sends `send.count` items to each rank, in rank order.
    ///
    /// # Safety
    /// `send` is read at root only and must hold `size()` blocks.
    unsafe fn scatter<'a>(
        &'a self,
        send: NativeBuf<Self::Datatype>,
        recv: NativeBuf<Self::Datatype>,
        root: Rank,
    ) -> BoxFuture<'a, Result<()>>;

    /// Collectively expose `size` bytes at `base` for one-sided access.
    ///
    /// # Safety
    /// The region must stay valid until the window is freed.
    unsafe fn win_create<'a>(
        &'a self,
        base: u64,
        size: Aint,
        disp_unit: i32,
    ) -> BoxFuture<'a, Result<Self::Window>>;

    /// Collective epoch boundary; completes all one-sided operations.
    fn win_fence<'a>(&'a self, win: &'a Self::Window) -> BoxFuture<'a, Result<()>>;

    fn win_free(&self, win: &Self::Window) -> Result<()>;

    /// # Safety
    /// `origin` must be valid; the target region must lie inside its window.
    unsafe fn put(
        &self,
        origin: NativeBuf<Self::Datatype>,
        target: NativeTarget<Self::Datatype>,
        win: &Self::Window,
    ) -> Result<()>;

    /// # Safety
    /// See [`put`](Self::put).
    unsafe fn get(
        &self,
        origin: NativeBuf<Self::Datatype>,
        target: NativeTarget<Self::Datatype>,
        win: &Self::Window,
    ) -> Result<()>;

    /// # Safety
    /// See [`put`](Self::put).
    unsafe fn accumulate(
        &self,
        origin: NativeBuf<Self::Datatype>,
        target: NativeTarget<Self::Datatype>,
        op: Self::Op,
        win: &Self::Window,
    ) -> Result<()>;

    /// # Safety
    /// See [`put`](Self::put); `result` receives the prior target contents.
    unsafe fn get_accumulate(
        &self,
        origin: NativeBuf<Self::Datatype>,
        result: NativeBuf<Self::Datatype>,
        target: NativeTarget<Self::Datatype>,
        op: Self::Op,
        win: &Self::Window,
    ) -> Result<()>;

    /// # Safety
    /// See [`put`](Self::put).
    unsafe fn rput(
        &self,
        origin: NativeBuf<Self::Datatype>,
        target: NativeTarget<Self::Datatype>,
        win: &Self::Window,
    ) -> Result<Self::Request>;

    /// # Safety
    /// See [`put`](Self::put).
    unsafe fn rget(
        &self,
        origin: NativeBuf<Self::Datatype>,
        target: NativeTarget<Self::Datatype>,
        win: &Self::Window,
    ) -> Result<Self::Request>;

    /// # Safety
    /// See [`put`](Self::put).
    unsafe fn raccumulate(
        &self,
        origin: NativeBuf<Self::Datatype>,
        target: NativeTarget<Self::Datatype>,
        op: Self::Op,
        win: &Self::Window,
    ) -> Result<Self::Request>;

    /// # Safety
    /// See [`get_accumulate`](Self::get_accumulate).
    unsafe fn rget_accumulate(
        &self,
        origin: NativeBuf<Self::Datatype>,
        result: NativeBuf<Self::Datatype>,
        target: NativeTarget<Self::Datatype>,
        op: Self::Op,
        win: &Self::Window,
    ) -> Result<Self::Request>;
}

/// Graph communicator freed on drop.
pub struct OwnedGraph<'t, T: Transport> {
    transport: &'t T,
    graph: T::Graph,
}

impl<'t, T: Transport> OwnedGraph<'t, T> {
    pub async fn create(transport: &'t T, topology: &GraphTopology) -> Result<Self> {
        let graph = transport.create_graph(topology).await?;
        Ok(Self { transport, graph })
    }

    pub fn raw(&self) -> &T::Graph {
        &self.graph
    }
}

impl<T: Transport> Drop for OwnedGraph<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.free_graph(&self.graph) {
            tracing::warn!(error = %e, "failed to free graph communicator");
        }
    }
}

/// One-sided window freed on drop.
pub struct OwnedWindow<'t, T: Transport> {
    transport: &'t T,
    win: T::Window,
}

impl<'t, T: Transport> OwnedWindow<'t, T> {
    /// # Safety
    /// See [`Transport::win_create`].
    pub async unsafe fn create(
        transport: &'t T,
        base: u64,
        size: Aint,
        disp_unit: i32,
    ) -> Result<Self> {
        let win = unsafe { transport.win_create(base, size, disp_unit) }.await?;
        Ok(Self { transport, win })
    }

    pub fn raw(&self) -> &T::Window {
        &self.win
    }

    pub async fn fence(&self) -> Result<()> {
        self.transport.win_fence(&self.win).await
    }
}

impl<T: Transport> Drop for OwnedWindow<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.win_free(&self.win) {
            tracing::warn!(error = %e, "failed to free window");
        }
    }
}

/// User-defined reduction operator freed on drop.
pub struct OwnedOp<'t, T: Transport> {
    transport: &'t T,
    op: T::Op,
}

impl<'t, T: Transport> OwnedOp<'t, T> {
    pub fn create(transport: &'t T, function: UserFunction<T>, commute: bool) -> Result<Self> {
        let op = transport.op_create(function, commute)?;
        Ok(Self { transport, op })
    }

    pub fn raw(&self) -> T::Op {
        self.op
    }
}

impl<T: Transport> Drop for OwnedOp<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.op_free(self.op) {
            tracing::warn!(op = ?self.op, error = %e, "failed to free reduction operator");
        }
    }
}
