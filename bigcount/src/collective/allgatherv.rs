use crate::config::Method;
use crate::convert::{CountArg, DisplArg, TypeArg};
use crate::error::Result;
use crate::topology::{CollectiveShape, GraphTopology};
use crate::transport::Transport;
use crate::types::{Aint, Count, SendBuf};

use super::execute;
use super::plan::{ExchangePlan, Side, check_call};

/// Every rank contributes `sendcount` items and receives every rank's
/// block, rank `i`'s at `rdispls[i]` extents of `recvtype`.
///
/// # Safety
/// `send` must hold `sendcount` items; every receive block must be writable
/// and the blocks must not overlap.
#[allow(clippy::too_many_arguments)]
pub async unsafe fn allgatherv_x<T: Transport>(
    t: &T,
    send: SendBuf,
    sendcount: Count,
    sendtype: T::Datatype,
    recv_ptr: u64,
    recvcounts: &[Count],
    rdispls: &[Aint],
    recvtype: T::Datatype,
    method: Method,
) -> Result<()> {
    let shape = CollectiveShape::AllgatherV;
    let send_ptr = check_call(t, shape, send, None)?;
    let plan = ExchangePlan {
        shape,
        send: Side::new(
            send_ptr,
            CountArg::Splat(sendcount),
            TypeArg::Splat(sendtype),
            DisplArg::Zero,
        ),
        recv: Side::new(
            recv_ptr,
            CountArg::PerPeer(recvcounts),
            TypeArg::Splat(recvtype),
            DisplArg::PerPeer(rdispls),
        ),
        topology: GraphTopology::for_shape(shape, t.size(), t.rank(), 0),
    };
    unsafe { execute(t, &plan, method) }.await
}
