use std::sync::atomic::Ordering;

use futures::future::BoxFuture;

use super::mailbox::MsgKey;
use super::memory::{self, offset};
use super::types::{Layout, TypeNode};
use super::{
    CONTEXT_COLLECTIVE, CONTEXT_P2P, LocalDatatype, LocalGraph, LocalOp, LocalRequest,
    LocalTransport, LocalWindow, PendingRecv, TAG_BCAST, TAG_REDUCE, TAG_SCATTER, WindowSlot,
};
use crate::datatype::{Contents, Envelope, TypeSystem};
use crate::error::{BigCountError, Result};
use crate::reduce::reduce_slice;
use crate::topology::GraphTopology;
use crate::transport::{NeighborBlock, Transport, UserFunction};
use crate::types::{Aint, Count, DataType, NativeBuf, NativeTarget, Rank, ReduceOp, SendBuf};

impl TypeSystem for LocalTransport {
    type Datatype = LocalDatatype;

    fn native_max(&self) -> Count {
        self.native_max
    }

    fn datatype_null(&self) -> LocalDatatype {
        LocalDatatype::NULL
    }

    fn predefined(&self, dtype: DataType) -> LocalDatatype {
        LocalDatatype::predefined(dtype)
    }

    fn type_contiguous(&self, count: i32, oldtype: LocalDatatype) -> Result<LocalDatatype> {
        self.check_count(count)?;
        self.shared
            .types
            .create(TypeNode::Contiguous { count, oldtype })
    }

    fn type_vector(
        &self,
        count: i32,
        blocklength: i32,
        stride: i32,
        oldtype: LocalDatatype,
    ) -> Result<LocalDatatype> {
        self.check_count(count)?;
        self.check_count(blocklength)?;
        self.shared.types.create(TypeNode::Vector {
            count,
            blocklength,
            stride,
            oldtype,
        })
    }

    fn type_create_struct(
        &self,
        blocklengths: &[i32],
        displacements: &[Aint],
        types: &[LocalDatatype],
    ) -> Result<LocalDatatype> {
        if blocklengths.len() != displacements.len() || blocklengths.len() != types.len() {
            return Err(BigCountError::VectorLength {
                what: "struct members",
                expected: blocklengths.len(),
                actual: displacements.len().min(types.len()),
            });
        }
        for bl in blocklengths {
            self.check_count(*bl)?;
        }
        self.shared.types.create(TypeNode::Struct {
            blocklengths: blocklengths.to_vec(),
            displacements: displacements.to_vec(),
            types: types.to_vec(),
        })
    }

    fn type_commit(&self, datatype: LocalDatatype) -> Result<()> {
        self.shared.types.commit(datatype)
    }

    fn type_free(&self, datatype: LocalDatatype) -> Result<()> {
        self.shared.types.free(datatype)
    }

    fn type_extent(&self, datatype: LocalDatatype) -> Result<(Aint, Aint)> {
        self.shared.types.extent(datatype)
    }

    fn type_envelope(&self, datatype: LocalDatatype) -> Result<Envelope> {
        self.shared.types.envelope(datatype)
    }

    fn type_contents(&self, datatype: LocalDatatype) -> Result<Contents<LocalDatatype>> {
        self.shared.types.contents(datatype)
    }
}

impl LocalTransport {
    fn check_count(&self, count: i32) -> Result<usize> {
        let wide = i64::from(count);
        if count < 0 || wide as Count > self.native_max {
            return Err(BigCountError::NativeLimitExceeded {
                count: wide,
                native_max: self.native_max,
            });
        }
        Ok(count as usize)
    }

    fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank >= self.size {
            return Err(BigCountError::InvalidRank {
                rank,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Count and memory map of a buffer about to be communicated.
    fn resolve(&self, count: i32, datatype: LocalDatatype) -> Result<(usize, Layout)> {
        let n = self.check_count(count)?;
        if n == 0 {
            return Ok((0, Layout::empty()));
        }
        Ok((n, self.shared.types.layout(datatype)?))
    }

    fn mailbox(&self, rank: Rank) -> Result<&super::mailbox::Mailbox> {
        self.check_rank(rank)?;
        Ok(&self.shared.mailboxes[rank as usize])
    }

    fn own_mailbox(&self) -> &super::mailbox::Mailbox {
        &self.shared.mailboxes[self.rank as usize]
    }

    fn user_function(&self, id: u32) -> Result<UserFunction<LocalTransport>> {
        self.shared
            .ops
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("ops"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| BigCountError::UnknownHandle(format!("op#{id}")))
    }

    /// `inout = op(in, inout)` on packed contributions.
    fn combine(
        &self,
        input: &[u8],
        inout: &mut Vec<u8>,
        count: usize,
        datatype: LocalDatatype,
        layout: &Layout,
        op: LocalOp,
    ) -> Result<()> {
        match op {
            LocalOp::Builtin(op) => {
                let basic = layout.basic.ok_or(BigCountError::UnsupportedDType {
                    dtype: DataType::U8,
                    op: "reduce over a mixed datatype",
                })?;
                let elems = inout.len() / basic.size_in_bytes();
                reduce_slice(inout, input, elems, basic, op)
            }
            LocalOp::User(id) => {
                let function = self.user_function(id)?;
                let (lo, hi) = memory::footprint(count, layout)?;
                if lo < 0 {
                    return Err(BigCountError::transport(
                        "user reduction over a datatype with negative offsets",
                    ));
                }
                let span = usize::try_from(hi).map_err(|_| BigCountError::Overflow("span"))?;
                let mut in_buf = vec![0u8; span];
                let mut inout_buf = vec![0u8; span];
                unsafe {
                    memory::unpack(input, in_buf.as_mut_ptr() as u64, count, layout)?;
                    memory::unpack(inout, inout_buf.as_mut_ptr() as u64, count, layout)?;
                }
                let n = i32::try_from(count)
                    .map_err(|_| BigCountError::NativeCountOverflow { value: count as i128 })?;
                function(
                    self,
                    in_buf.as_ptr() as u64,
                    inout_buf.as_mut_ptr() as u64,
                    n,
                    datatype,
                )?;
                *inout = unsafe { memory::pack(inout_buf.as_ptr() as u64, count, layout) };
                Ok(())
            }
        }
    }

    /// Gather contributions at `root` and fold them in rank order.
    ///
    /// Returns the packed result at root and `None` elsewhere.
    async unsafe fn reduce_packed(
        &self,
        send: SendBuf,
        recv_ptr: u64,
        count: i32,
        datatype: LocalDatatype,
        op: LocalOp,
        root: Rank,
    ) -> Result<Option<Vec<u8>>> {
        self.check_rank(root)?;
        let (n, layout) = self.resolve(count, datatype)?;
        let own_addr = send.addr().unwrap_or(recv_ptr);
        let own = unsafe { memory::pack(own_addr, n, &layout) };
        if self.rank != root {
            let key = MsgKey {
                context: CONTEXT_COLLECTIVE,
                source: self.rank,
                tag: TAG_REDUCE,
            };
            self.mailbox(root)?.deliver(key, own)?;
            return Ok(None);
        }

        let mut contributions = Vec::with_capacity(self.size as usize);
        let mut own = Some(own);
        for source in 0..self.size {
            if source == self.rank {
                contributions.push(own.take().unwrap_or_default());
                continue;
            }
            let key = MsgKey {
                context: CONTEXT_COLLECTIVE,
                source,
                tag: TAG_REDUCE,
            };
            contributions.push(self.own_mailbox().take(key).await?);
        }

        // Fold from the highest rank down: acc = x[i] op acc.
        let Some(mut acc) = contributions.pop() else {
            return Ok(Some(Vec::new()));
        };
        while let Some(input) = contributions.pop() {
            self.combine(&input, &mut acc, n, datatype, &layout, op)?;
        }
        Ok(Some(acc))
    }

    fn window_slot(&self, win: &LocalWindow, rank: Rank) -> Result<WindowSlot> {
        self.check_rank(rank)?;
        self.shared
            .windows
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("windows"))?
            .get(&(win.id, rank))
            .copied()
            .ok_or_else(|| BigCountError::UnknownHandle(format!("window#{}@{rank}", win.id)))
    }

    /// Address, count and layout of a one-sided target region, bounds-checked
    /// against the target's window.
    fn target_region(
        &self,
        win: &LocalWindow,
        target: &NativeTarget<LocalDatatype>,
    ) -> Result<(u64, usize, Layout)> {
        let slot = self.window_slot(win, target.rank)?;
        let (n, layout) = self.resolve(target.count, target.datatype)?;
        let disp = target
            .disp
            .checked_mul(Aint::from(slot.disp_unit))
            .ok_or(BigCountError::Overflow("target displacement"))?;
        let (lo, hi) = memory::footprint(n, &layout)?;
        if n > 0 && (disp + lo < 0 || disp + hi > slot.size) {
            return Err(BigCountError::transport(format!(
                "target region [{}, {}) outside window of {} bytes on rank {}",
                disp + lo,
                disp + hi,
                slot.size,
                target.rank
            )));
        }
        Ok((offset(slot.base, disp), n, layout))
    }

    unsafe fn rma_accumulate(
        &self,
        origin: NativeBuf<LocalDatatype>,
        result: Option<NativeBuf<LocalDatatype>>,
        target: NativeTarget<LocalDatatype>,
        op: LocalOp,
        win: &LocalWindow,
    ) -> Result<()> {
        let LocalOp::Builtin(op) = op else {
            return Err(BigCountError::transport(
                "accumulate only supports predefined operators",
            ));
        };
        let (addr, n, layout) = self.target_region(win, &target)?;
        let (on, olayout) = self.resolve(origin.count, origin.datatype)?;
        let incoming = unsafe { memory::pack(origin.addr, on, &olayout) };
        if incoming.len() != n * layout.size {
            return Err(BigCountError::BufferSizeMismatch {
                expected: n * layout.size,
                actual: incoming.len(),
            });
        }

        let _guard = self
            .shared
            .accumulate_lock
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("accumulate"))?;
        let mut current = unsafe { memory::pack(addr, n, &layout) };
        if let Some(result) = result {
            let (rn, rlayout) = self.resolve(result.count, result.datatype)?;
            unsafe { memory::unpack(&current, result.addr, rn, &rlayout)? };
        }
        if n == 0 {
            return Ok(());
        }
        let basic = layout.basic.ok_or(BigCountError::UnsupportedDType {
            dtype: DataType::U8,
            op: "accumulate over a mixed datatype",
        })?;
        let elems = current.len() / basic.size_in_bytes();
        reduce_slice(&mut current, &incoming, elems, basic, op)?;
        unsafe { memory::unpack(&current, addr, n, &layout) }
    }

    unsafe fn rma_put(
        &self,
        origin: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        win: &LocalWindow,
    ) -> Result<()> {
        let (addr, n, layout) = self.target_region(win, &target)?;
        let (on, olayout) = self.resolve(origin.count, origin.datatype)?;
        let data = unsafe { memory::pack(origin.addr, on, &olayout) };
        if data.len() != n * layout.size {
            return Err(BigCountError::BufferSizeMismatch {
                expected: n * layout.size,
                actual: data.len(),
            });
        }
        unsafe { memory::unpack(&data, addr, n, &layout) }
    }

    unsafe fn rma_get(
        &self,
        origin: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        win: &LocalWindow,
    ) -> Result<()> {
        let (addr, n, layout) = self.target_region(win, &target)?;
        let (on, olayout) = self.resolve(origin.count, origin.datatype)?;
        let data = unsafe { memory::pack(addr, n, &layout) };
        if data.len() != on * olayout.size {
            return Err(BigCountError::BufferSizeMismatch {
                expected: on * olayout.size,
                actual: data.len(),
            });
        }
        unsafe { memory::unpack(&data, origin.addr, on, &olayout) }
    }
}

impl Transport for LocalTransport {
    type Graph = LocalGraph;
    type Window = LocalWindow;
    type Op = LocalOp;
    type Request = LocalRequest;

    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn is_inter(&self) -> bool {
        self.inter
    }

    fn create_graph<'a>(&'a self, topology: &'a GraphTopology) -> BoxFuture<'a, Result<LocalGraph>> {
        Box::pin(async move {
            for &r in topology.sources.iter().chain(&topology.destinations) {
                self.check_rank(r)?;
            }
            let graph = LocalGraph {
                context: self.next_graph_context(),
                sources: topology.sources.clone(),
                destinations: topology.destinations.clone(),
            };
            tracing::trace!(
                rank = self.rank,
                context = graph.context,
                indegree = graph.sources.len(),
                outdegree = graph.destinations.len(),
                "created graph communicator"
            );
            Ok(graph)
        })
    }

    fn free_graph(&self, _graph: &LocalGraph) -> Result<()> {
        Ok(())
    }

    unsafe fn neighbor_alltoallw<'a>(
        &'a self,
        graph: &'a LocalGraph,
        send_ptr: u64,
        send: &'a [NeighborBlock<LocalDatatype>],
        recv_ptr: u64,
        recv: &'a [NeighborBlock<LocalDatatype>],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if send.len() != graph.destinations.len() {
                return Err(BigCountError::VectorLength {
                    what: "send blocks",
                    expected: graph.destinations.len(),
                    actual: send.len(),
                });
            }
            if recv.len() != graph.sources.len() {
                return Err(BigCountError::VectorLength {
                    what: "recv blocks",
                    expected: graph.sources.len(),
                    actual: recv.len(),
                });
            }
            // Resolve every block before any message leaves.
            let outgoing = send
                .iter()
                .map(|b| self.resolve(b.count, b.datatype))
                .collect::<Result<Vec<_>>>()?;
            let incoming = recv
                .iter()
                .map(|b| self.resolve(b.count, b.datatype))
                .collect::<Result<Vec<_>>>()?;

            let key = MsgKey {
                context: graph.context,
                source: self.rank,
                tag: 0,
            };
            for ((block, (n, layout)), &dest) in send.iter().zip(&outgoing).zip(&graph.destinations) {
                let payload =
                    unsafe { memory::pack(offset(send_ptr, block.displacement), *n, layout) };
                self.mailbox(dest)?.deliver(key, payload)?;
            }
            for ((block, (n, layout)), &source) in recv.iter().zip(&incoming).zip(&graph.sources) {
                let key = MsgKey {
                    context: graph.context,
                    source,
                    tag: 0,
                };
                let payload = self.own_mailbox().take(key).await?;
                unsafe {
                    memory::unpack(&payload, offset(recv_ptr, block.displacement), *n, layout)?
                };
            }
            Ok(())
        })
    }

    unsafe fn isend(
        &self,
        buf: NativeBuf<LocalDatatype>,
        dest: Rank,
        tag: i32,
    ) -> Result<LocalRequest> {
        let (n, layout) = self.resolve(buf.count, buf.datatype)?;
        let payload = unsafe { memory::pack(buf.addr, n, &layout) };
        let key = MsgKey {
            context: CONTEXT_P2P,
            source: self.rank,
            tag,
        };
        self.mailbox(dest)?.deliver(key, payload)?;
        Ok(LocalRequest::Complete)
    }

    unsafe fn irecv(
        &self,
        buf: NativeBuf<LocalDatatype>,
        source: Rank,
        tag: i32,
    ) -> Result<LocalRequest> {
        self.check_rank(source)?;
        let (count, layout) = self.resolve(buf.count, buf.datatype)?;
        Ok(LocalRequest::Recv(PendingRecv {
            key: MsgKey {
                context: CONTEXT_P2P,
                source,
                tag,
            },
            addr: buf.addr,
            count,
            layout,
        }))
    }

    fn wait(&self, request: LocalRequest) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            match request {
                LocalRequest::Complete => Ok(()),
                LocalRequest::Recv(recv) => {
                    let payload = self.own_mailbox().take(recv.key).await?;
                    unsafe { memory::unpack(&payload, recv.addr, recv.count, &recv.layout) }
                }
            }
        })
    }

    fn wait_all(&self, requests: Vec<LocalRequest>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut first_err = None;
            for request in requests {
                if let Err(e) = self.wait(request).await {
                    first_err.get_or_insert(e);
                }
            }
            first_err.map_or(Ok(()), Err)
        })
    }

    fn builtin_op(&self, op: ReduceOp) -> LocalOp {
        LocalOp::Builtin(op)
    }

    fn op_create(&self, function: UserFunction<Self>, commute: bool) -> Result<LocalOp> {
        let id = self.shared.next_op.fetch_add(1, Ordering::Relaxed);
        self.shared
            .ops
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("ops"))?
            .insert(id, function);
        tracing::trace!(rank = self.rank, id, commute, "registered user reduction");
        Ok(LocalOp::User(id))
    }

    fn op_free(&self, op: LocalOp) -> Result<()> {
        let LocalOp::User(id) = op else {
            return Err(BigCountError::UnknownHandle(format!("{op:?}")));
        };
        self.shared
            .ops
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("ops"))?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| BigCountError::UnknownHandle(format!("op#{id}")))
    }

    unsafe fn reduce_local(
        &self,
        in_ptr: u64,
        inout_ptr: u64,
        count: i32,
        datatype: LocalDatatype,
        op: LocalOp,
    ) -> Result<()> {
        let (n, layout) = self.resolve(count, datatype)?;
        if n == 0 {
            return Ok(());
        }
        let input = unsafe { memory::pack(in_ptr, n, &layout) };
        let mut inout = unsafe { memory::pack(inout_ptr, n, &layout) };
        self.combine(&input, &mut inout, n, datatype, &layout, op)?;
        unsafe { memory::unpack(&inout, inout_ptr, n, &layout) }
    }

    unsafe fn reduce<'a>(
        &'a self,
        send: SendBuf,
        recv_ptr: u64,
        count: i32,
        datatype: LocalDatatype,
        op: LocalOp,
        root: Rank,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let result =
                unsafe { self.reduce_packed(send, recv_ptr, count, datatype, op, root) }.await?;
            if let Some(result) = result {
                let (n, layout) = self.resolve(count, datatype)?;
                unsafe { memory::unpack(&result, recv_ptr, n, &layout)? };
            }
            Ok(())
        })
    }

    unsafe fn allreduce<'a>(
        &'a self,
        send: SendBuf,
        recv_ptr: u64,
        count: i32,
        datatype: LocalDatatype,
        op: LocalOp,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let (n, layout) = self.resolve(count, datatype)?;
            let result =
                unsafe { self.reduce_packed(send, recv_ptr, count, datatype, op, 0) }.await?;
            let key = MsgKey {
                context: CONTEXT_COLLECTIVE,
                source: 0,
                tag: TAG_BCAST,
            };
            let result = match result {
                Some(result) => {
                    for dest in 1..self.size {
                        self.mailbox(dest)?.deliver(key, result.clone())?;
                    }
                    result
                }
                None => self.own_mailbox().take(key).await?,
            };
            unsafe { memory::unpack(&result, recv_ptr, n, &layout) }
        })
    }

    unsafe fn scatter<'a>(
        &'a self,
        send: NativeBuf<LocalDatatype>,
        recv: NativeBuf<LocalDatatype>,
        root: Rank,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.check_rank(root)?;
            let (rn, rlayout) = self.resolve(recv.count, recv.datatype)?;
            let key = MsgKey {
                context: CONTEXT_COLLECTIVE,
                source: root,
                tag: TAG_SCATTER,
            };
            if self.rank == root {
                let (sn, slayout) = self.resolve(send.count, send.datatype)?;
                let stride = (sn as Aint)
                    .checked_mul(slayout.extent)
                    .ok_or(BigCountError::Overflow("scatter stride"))?;
                for dest in 0..self.size {
                    let addr = offset(send.addr, Aint::from(dest) * stride);
                    let payload = unsafe { memory::pack(addr, sn, &slayout) };
                    self.mailbox(dest)?.deliver(key, payload)?;
                }
            }
            let payload = self.own_mailbox().take(key).await?;
            unsafe { memory::unpack(&payload, recv.addr, rn, &rlayout) }
        })
    }

    unsafe fn win_create<'a>(
        &'a self,
        base: u64,
        size: Aint,
        disp_unit: i32,
    ) -> BoxFuture<'a, Result<LocalWindow>> {
        Box::pin(async move {
            if size < 0 || disp_unit <= 0 {
                return Err(BigCountError::transport(format!(
                    "invalid window size {size} or displacement unit {disp_unit}"
                )));
            }
            let win = LocalWindow {
                id: self.next_window_id(),
            };
            self.shared
                .windows
                .lock()
                .map_err(|_| BigCountError::LockPoisoned("windows"))?
                .insert(
                    (win.id, self.rank),
                    WindowSlot {
                        base,
                        size,
                        disp_unit,
                    },
                );
            self.shared.barrier.wait().await;
            Ok(win)
        })
    }

    fn win_fence<'a>(&'a self, _win: &'a LocalWindow) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.shared.barrier.wait().await;
            Ok(())
        })
    }

    fn win_free(&self, win: &LocalWindow) -> Result<()> {
        self.shared
            .windows
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("windows"))?
            .remove(&(win.id, self.rank))
            .map(|_| ())
            .ok_or_else(|| BigCountError::UnknownHandle(format!("window#{}", win.id)))
    }

    unsafe fn put(
        &self,
        origin: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        win: &LocalWindow,
    ) -> Result<()> {
        unsafe { self.rma_put(origin, target, win) }
    }

    unsafe fn get(
        &self,
        origin: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        win: &LocalWindow,
    ) -> Result<()> {
        unsafe { self.rma_get(origin, target, win) }
    }

    unsafe fn accumulate(
        &self,
        origin: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        op: LocalOp,
        win: &LocalWindow,
    ) -> Result<()> {
        unsafe { self.rma_accumulate(origin, None, target, op, win) }
    }

    unsafe fn get_accumulate(
        &self,
        origin: NativeBuf<LocalDatatype>,
        result: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        op: LocalOp,
        win: &LocalWindow,
    ) -> Result<()> {
        unsafe { self.rma_accumulate(origin, Some(result), target, op, win) }
    }

    unsafe fn rput(
        &self,
        origin: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        win: &LocalWindow,
    ) -> Result<LocalRequest> {
        unsafe { self.rma_put(origin, target, win)? };
        Ok(LocalRequest::Complete)
    }

    unsafe fn rget(
        &self,
        origin: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        win: &LocalWindow,
    ) -> Result<LocalRequest> {
        unsafe { self.rma_get(origin, target, win)? };
        Ok(LocalRequest::Complete)
    }

    unsafe fn raccumulate(
        &self,
        origin: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        op: LocalOp,
        win: &LocalWindow,
    ) -> Result<LocalRequest> {
        unsafe { self.rma_accumulate(origin, None, target, op, win)? };
        Ok(LocalRequest::Complete)
    }

    unsafe fn rget_accumulate(
        &self,
        origin: NativeBuf<LocalDatatype>,
        result: NativeBuf<LocalDatatype>,
        target: NativeTarget<LocalDatatype>,
        op: LocalOp,
        win: &LocalWindow,
    ) -> Result<LocalRequest> {
        unsafe { self.rma_accumulate(origin, Some(result), target, op, win)? };
        Ok(LocalRequest::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalWorld;
    use std::sync::Arc;

    fn world(size: u32) -> Vec<Arc<LocalTransport>> {
        LocalWorld::new(size)
            .native_max(16)
            .bootstrap()
            .unwrap()
            .into_iter()
            .map(Arc::new)
            .collect()
    }

    #[test]
    fn test_count_limit_enforced() {
        let t = LocalWorld::new(1).native_max(16).single().unwrap();
        let i32_t = t.predefined(DataType::I32);
        assert!(t.type_contiguous(16, i32_t).is_ok());
        assert!(matches!(
            t.type_contiguous(17, i32_t),
            Err(BigCountError::NativeLimitExceeded { count: 17, .. })
        ));
        let buf = [0i32; 17];
        let err = unsafe { t.isend(NativeBuf::new(buf.as_ptr() as u64, 17, i32_t), 0, 0) };
        assert!(err.is_err());
        assert_eq!(t.pending_messages(), 0);
    }

    #[test]
    fn test_uncommitted_send_rejected() {
        let t = LocalWorld::new(1).single().unwrap();
        let c = t.type_contiguous(2, t.predefined(DataType::U8)).unwrap();
        let buf = [0u8; 2];
        let err = unsafe { t.isend(NativeBuf::new(buf.as_ptr() as u64, 1, c), 0, 0) };
        assert!(matches!(err, Err(BigCountError::TypeNotCommitted(_))));
    }

    #[tokio::test]
    async fn test_self_send_recv() {
        let t = LocalWorld::new(1).single().unwrap();
        let i64_t = t.predefined(DataType::I64);
        let send = [1i64, 2, 3];
        let mut recv = [0i64; 3];
        unsafe {
            let r = t
                .irecv(NativeBuf::new(recv.as_mut_ptr() as u64, 3, i64_t), 0, 9)
                .unwrap();
            let s = t
                .isend(NativeBuf::new(send.as_ptr() as u64, 3, i64_t), 0, 9)
                .unwrap();
            t.wait_all(vec![r, s]).await.unwrap();
        }
        assert_eq!(recv, send);
    }

    #[test]
    fn test_reduce_local_builtin() {
        let t = LocalWorld::new(1).single().unwrap();
        let u32_t = t.predefined(DataType::U32);
        let input = [1u32, 2, 3];
        let mut inout = [10u32, 20, 30];
        unsafe {
            t.reduce_local(
                input.as_ptr() as u64,
                inout.as_mut_ptr() as u64,
                3,
                u32_t,
                t.builtin_op(ReduceOp::Sum),
            )
            .unwrap();
        }
        assert_eq!(inout, [11, 22, 33]);
    }

    #[tokio::test]
    async fn test_allreduce_across_ranks() {
        let ranks = world(3);
        let mut handles = Vec::new();
        for t in &ranks {
            let t = Arc::clone(t);
            handles.push(tokio::spawn(async move {
                let i32_t = t.predefined(DataType::I32);
                let send = vec![t.rank() as i32 + 1; 4];
                let mut recv = vec![0i32; 4];
                unsafe {
                    t.allreduce(
                        SendBuf::Addr(send.as_ptr() as u64),
                        recv.as_mut_ptr() as u64,
                        4,
                        i32_t,
                        t.builtin_op(ReduceOp::Prod),
                    )
                    .await
                    .unwrap();
                }
                assert_eq!(recv, vec![6; 4]);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_window_bounds_checked() {
        let t = LocalWorld::new(1).single().unwrap();
        let i32_t = t.predefined(DataType::I32);
        let mut exposed = vec![0i32; 4];
        let origin = [5i32; 2];
        let win = unsafe { t.win_create(exposed.as_mut_ptr() as u64, 16, 4) }
            .await
            .unwrap();
        unsafe {
            t.put(
                NativeBuf::new(origin.as_ptr() as u64, 2, i32_t),
                NativeTarget::new(0, 2, 2, i32_t),
                &win,
            )
            .unwrap();
            assert!(
                t.put(
                    NativeBuf::new(origin.as_ptr() as u64, 2, i32_t),
                    NativeTarget::new(0, 3, 2, i32_t),
                    &win,
                )
                .is_err()
            );
        }
        t.win_free(&win).unwrap();
        assert_eq!(exposed, vec![0, 0, 5, 5]);
        assert_eq!(t.live_windows(), 0);
    }
}
