use crate::config::Method;
use crate::convert::{CountArg, DisplArg, TypeArg};
use crate::error::Result;
use crate::topology::{CollectiveShape, GraphTopology};
use crate::transport::Transport;
use crate::types::{Aint, Count, Rank, SendBuf};

use super::execute;
use super::plan::{ExchangePlan, Side, check_call};

/// Gather `sendcount` items from every rank into `recv_ptr` at `root`.
///
/// Rank `i`'s block lands `rdispls[i]` extents of `recvtype` into the
/// receive buffer. `recvcounts`, `rdispls` and `recvtype` are only read at
/// the root; other ranks may pass empty slices.
///
/// # Safety
/// `send` must hold `sendcount` items; at root every receive block must be
/// writable and the blocks must not overlap.
#[allow(clippy::too_many_arguments)]
pub async unsafe fn gatherv_x<T: Transport>(
    t: &T,
    send: SendBuf,
    sendcount: Count,
    sendtype: T::Datatype,
    recv_ptr: u64,
    recvcounts: &[Count],
    rdispls: &[Aint],
    recvtype: T::Datatype,
    root: Rank,
    method: Method,
) -> Result<()> {
    let shape = CollectiveShape::GatherV;
    let send_ptr = check_call(t, shape, send, Some(root))?;
    let recv = if t.rank() == root {
        Side::new(
            recv_ptr,
            CountArg::PerPeer(recvcounts),
            TypeArg::Splat(recvtype),
            DisplArg::PerPeer(rdispls),
        )
    } else {
        Side::suppressed(recv_ptr, recvtype)
    };
    let plan = ExchangePlan {
        shape,
        send: Side::new(
            send_ptr,
            CountArg::Splat(sendcount),
            TypeArg::Splat(sendtype),
            DisplArg::Zero,
        ),
        recv,
        topology: GraphTopology::for_shape(shape, t.size(), t.rank(), root),
    };
    unsafe { execute(t, &plan, method) }.await
}
