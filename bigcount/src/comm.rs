//! Method-call surface over the free functions.

use crate::config::BigCountConfig;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{Aint, Count, Rank, ReduceOp, SendBuf, WideBuf, WideTarget};

/// A transport paired with the strategies its wide calls should use.
///
/// Collectives run with [`BigCountConfig::vcoll_method`] and reductions with
/// [`BigCountConfig::reduce_strategy`]; the free functions in
/// [`collective`](crate::collective) and [`reduction`](crate::reduction)
/// take the strategy explicitly instead.
pub struct WideComm<'t, T: Transport> {
    transport: &'t T,
    config: BigCountConfig,
}

impl<'t, T: Transport> WideComm<'t, T> {
    pub fn new(transport: &'t T, config: BigCountConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &'t T {
        self.transport
    }

    pub fn config(&self) -> &BigCountConfig {
        &self.config
    }

    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    pub fn size(&self) -> u32 {
        self.transport.size()
    }

    // Point-to-point

    /// # Safety
    /// See [`p2p::isend_x`](crate::p2p::isend_x).
    pub unsafe fn isend(&self, buf: WideBuf<T::Datatype>, dest: Rank, tag: i32) -> Result<T::Request> {
        unsafe { crate::p2p::isend_x(self.transport, buf, dest, tag) }
    }

    /// # Safety
    /// See [`p2p::irecv_x`](crate::p2p::irecv_x).
    pub unsafe fn irecv(&self, buf: WideBuf<T::Datatype>, source: Rank, tag: i32) -> Result<T::Request> {
        unsafe { crate::p2p::irecv_x(self.transport, buf, source, tag) }
    }

    /// # Safety
    /// See [`p2p::send_x`](crate::p2p::send_x).
    pub async unsafe fn send(&self, buf: WideBuf<T::Datatype>, dest: Rank, tag: i32) -> Result<()> {
        unsafe { crate::p2p::send_x(self.transport, buf, dest, tag) }.await
    }

    /// # Safety
    /// See [`p2p::recv_x`](crate::p2p::recv_x).
    pub async unsafe fn recv(&self, buf: WideBuf<T::Datatype>, source: Rank, tag: i32) -> Result<()> {
        unsafe { crate::p2p::recv_x(self.transport, buf, source, tag) }.await
    }

    // Irregular collectives

    /// # Safety
    /// See [`collective::gatherv_x`](crate::collective::gatherv_x).
    #[allow(clippy::too_many_arguments)]
    pub async unsafe fn gatherv(
        &self,
        send: SendBuf,
        sendcount: Count,
        sendtype: T::Datatype,
        recv_ptr: u64,
        recvcounts: &[Count],
        rdispls: &[Aint],
        recvtype: T::Datatype,
        root: Rank,
    ) -> Result<()> {
        unsafe {
            crate::collective::gatherv_x(
                self.transport,
                send,
                sendcount,
                sendtype,
                recv_ptr,
                recvcounts,
                rdispls,
                recvtype,
                root,
                self.config.vcoll_method,
            )
        }
        .await
    }

    /// # Safety
    /// See [`collective::scatterv_x`](crate::collective::scatterv_x).
    #[allow(clippy::too_many_arguments)]
    pub async unsafe fn scatterv(
        &self,
        send_ptr: u64,
        sendcounts: &[Count],
        sdispls: &[Aint],
        sendtype: T::Datatype,
        recv_ptr: u64,
        recvcount: Count,
        recvtype: T::Datatype,
        root: Rank,
    ) -> Result<()> {
        unsafe {
            crate::collective::scatterv_x(
                self.transport,
                send_ptr,
                sendcounts,
                sdispls,
                sendtype,
                recv_ptr,
                recvcount,
                recvtype,
                root,
                self.config.vcoll_method,
            )
        }
        .await
    }

    /// # Safety
    /// See [`collective::allgatherv_x`](crate::collective::allgatherv_x).
    #[allow(clippy::too_many_arguments)]
    pub async unsafe fn allgatherv(
        &self,
        send: SendBuf,
        sendcount: Count,
        sendtype: T::Datatype,
        recv_ptr: u64,
        recvcounts: &[Count],
        rdispls: &[Aint],
        recvtype: T::Datatype,
    ) -> Result<()> {
        unsafe {
            crate::collective::allgatherv_x(
                self.transport,
                send,
                sendcount,
                sendtype,
                recv_ptr,
                recvcounts,
                rdispls,
                recvtype,
                self.config.vcoll_method,
            )
        }
        .await
    }

    /// # Safety
    /// See [`collective::alltoallv_x`](crate::collective::alltoallv_x).
    #[allow(clippy::too_many_arguments)]
    pub async unsafe fn alltoallv(
        &self,
        send: SendBuf,
        sendcounts: &[Count],
        sdispls: &[Aint],
        sendtype: T::Datatype,
        recv_ptr: u64,
        recvcounts: &[Count],
        rdispls: &[Aint],
        recvtype: T::Datatype,
    ) -> Result<()> {
        unsafe {
            crate::collective::alltoallv_x(
                self.transport,
                send,
                sendcounts,
                sdispls,
                sendtype,
                recv_ptr,
                recvcounts,
                rdispls,
                recvtype,
                self.config.vcoll_method,
            )
        }
        .await
    }

    /// # Safety
    /// See [`collective::alltoallw_x`](crate::collective::alltoallw_x).
    #[allow(clippy::too_many_arguments)]
    pub async unsafe fn alltoallw(
        &self,
        send: SendBuf,
        sendcounts: &[Count],
        sdispls: &[Aint],
        sendtypes: &[T::Datatype],
        recv_ptr: u64,
        recvcounts: &[Count],
        rdispls: &[Aint],
        recvtypes: &[T::Datatype],
    ) -> Result<()> {
        unsafe {
            crate::collective::alltoallw_x(
                self.transport,
                send,
                sendcounts,
                sdispls,
                sendtypes,
                recv_ptr,
                recvcounts,
                rdispls,
                recvtypes,
                self.config.vcoll_method,
            )
        }
        .await
    }

    /// # Safety
    /// See [`collective::scatter_x`](crate::collective::scatter_x).
    pub async unsafe fn scatter(
        &self,
        send: WideBuf<T::Datatype>,
        recv: WideBuf<T::Datatype>,
        root: Rank,
    ) -> Result<()> {
        unsafe { crate::collective::scatter_x(self.transport, send, recv, root) }.await
    }

    // Reductions

    /// # Safety
    /// See [`reduction::reduce_x`](crate::reduction::reduce_x).
    pub async unsafe fn reduce(
        &self,
        send: SendBuf,
        recv_ptr: u64,
        count: Count,
        datatype: T::Datatype,
        op: ReduceOp,
        root: Rank,
    ) -> Result<()> {
        unsafe {
            crate::reduction::reduce_x(
                self.transport,
                self.config.reduce_strategy,
                send,
                recv_ptr,
                count,
                datatype,
                op,
                root,
            )
        }
        .await
    }

    /// # Safety
    /// See [`reduction::allreduce_x`](crate::reduction::allreduce_x).
    pub async unsafe fn allreduce(
        &self,
        send: SendBuf,
        recv_ptr: u64,
        count: Count,
        datatype: T::Datatype,
        op: ReduceOp,
    ) -> Result<()> {
        unsafe {
            crate::reduction::allreduce_x(
                self.transport,
                self.config.reduce_strategy,
                send,
                recv_ptr,
                count,
                datatype,
                op,
            )
        }
        .await
    }

    /// # Safety
    /// See [`reduction::reduce_scatter_block_x`](crate::reduction::reduce_scatter_block_x).
    pub async unsafe fn reduce_scatter_block(
        &self,
        send: SendBuf,
        recv_ptr: u64,
        recvcount: Count,
        datatype: T::Datatype,
        op: ReduceOp,
    ) -> Result<()> {
        unsafe {
            crate::reduction::reduce_scatter_block_x(
                self.transport,
                self.config.reduce_strategy,
                send,
                recv_ptr,
                recvcount,
                datatype,
                op,
            )
        }
        .await
    }

    // One-sided

    /// # Safety
    /// See [`rma::put_x`](crate::rma::put_x).
    pub unsafe fn put(
        &self,
        origin: WideBuf<T::Datatype>,
        target: WideTarget<T::Datatype>,
        win: &T::Window,
    ) -> Result<()> {
        unsafe { crate::rma::put_x(self.transport, origin, target, win) }
    }

    /// # Safety
    /// See [`rma::get_x`](crate::rma::get_x).
    pub unsafe fn get(
        &self,
        origin: WideBuf<T::Datatype>,
        target: WideTarget<T::Datatype>,
        win: &T::Window,
    ) -> Result<()> {
        unsafe { crate::rma::get_x(self.transport, origin, target, win) }
    }

    /// # Safety
    /// See [`rma::accumulate_x`](crate::rma::accumulate_x).
    pub unsafe fn accumulate(
        &self,
        origin: WideBuf<T::Datatype>,
        target: WideTarget<T::Datatype>,
        op: ReduceOp,
        win: &T::Window,
    ) -> Result<()> {
        unsafe { crate::rma::accumulate_x(self.transport, origin, target, op, win) }
    }

    /// # Safety
    /// See [`rma::get_accumulate_x`](crate::rma::get_accumulate_x).
    pub unsafe fn get_accumulate(
        &self,
        origin: WideBuf<T::Datatype>,
        result: WideBuf<T::Datatype>,
        target: WideTarget<T::Datatype>,
        op: ReduceOp,
        win: &T::Window,
    ) -> Result<()> {
        unsafe { crate::rma::get_accumulate_x(self.transport, origin, result, target, op, win) }
    }

    /// # Safety
    /// See [`rma::rput_x`](crate::rma::rput_x).
    pub unsafe fn rput(
        &self,
        origin: WideBuf<T::Datatype>,
        target: WideTarget<T::Datatype>,
        win: &T::Window,
    ) -> Result<T::Request> {
        unsafe { crate::rma::rput_x(self.transport, origin, target, win) }
    }

    /// # Safety
    /// See [`rma::rget_x`](crate::rma::rget_x).
    pub unsafe fn rget(
        &self,
        origin: WideBuf<T::Datatype>,
        target: WideTarget<T::Datatype>,
        win: &T::Window,
    ) -> Result<T::Request> {
        unsafe { crate::rma::rget_x(self.transport, origin, target, win) }
    }

    /// # Safety
    /// See [`rma::raccumulate_x`](crate::rma::raccumulate_x).
    pub unsafe fn raccumulate(
        &self,
        origin: WideBuf<T::Datatype>,
        target: WideTarget<T::Datatype>,
        op: ReduceOp,
        win: &T::Window,
    ) -> Result<T::Request> {
        unsafe { crate::rma::raccumulate_x(self.transport, origin, target, op, win) }
    }

    /// # Safety
    /// See [`rma::rget_accumulate_x`](crate::rma::rget_accumulate_x).
    pub unsafe fn rget_accumulate(
        &self,
        origin: WideBuf<T::Datatype>,
        result: WideBuf<T::Datatype>,
        target: WideTarget<T::Datatype>,
        op: ReduceOp,
        win: &T::Window,
    ) -> Result<T::Request> {
        unsafe { crate::rma::rget_accumulate_x(self.transport, origin, result, target, op, win) }
    }
}
