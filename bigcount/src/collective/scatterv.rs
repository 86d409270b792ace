use crate::config::Method;
use crate::convert::{CountArg, DisplArg, TypeArg};
use crate::error::Result;
use crate::topology::{CollectiveShape, GraphTopology};
use crate::transport::Transport;
use crate::types::{Aint, Count, Rank, SendBuf};

use super::execute;
use super::plan::{ExchangePlan, Side, check_call};

/// Scatter `sendcounts[i]` items from `root` to each rank `i`.
///
/// Only the root reads `send_ptr`, `sendcounts`, `sdispls` and `sendtype`.
///
/// # Safety
/// At root every send block must be readable; `recv_ptr` must hold
/// `recvcount` items of `recvtype` on every rank.
#[allow(clippy::too_many_arguments)]
pub async unsafe fn scatterv_x<T: Transport>(
    t: &T,
    send_ptr: u64,
    sendcounts: &[Count],
    sdispls: &[Aint],
    sendtype: T::Datatype,
    recv_ptr: u64,
    recvcount: Count,
    recvtype: T::Datatype,
    root: Rank,
    method: Method,
) -> Result<()> {
    let shape = CollectiveShape::ScatterV;
    check_call(t, shape, SendBuf::Addr(send_ptr), Some(root))?;
    let send = if t.rank() == root {
        Side::new(
            send_ptr,
            CountArg::PerPeer(sendcounts),
            TypeArg::Splat(sendtype),
            DisplArg::PerPeer(sdispls),
        )
    } else {
        Side::suppressed(send_ptr, sendtype)
    };
    let plan = ExchangePlan {
        shape,
        send,
        recv: Side::new(
            recv_ptr,
            CountArg::Splat(recvcount),
            TypeArg::Splat(recvtype),
            DisplArg::Zero,
        ),
        topology: GraphTopology::for_shape(shape, t.size(), t.rank(), root),
    };
    unsafe { execute(t, &plan, method) }.await
}
