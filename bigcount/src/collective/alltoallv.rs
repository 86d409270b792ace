use crate::config::Method;
use crate::convert::{CountArg, DisplArg, TypeArg};
use crate::error::Result;
use crate::topology::{CollectiveShape, GraphTopology};
use crate::transport::Transport;
use crate::types::{Aint, Count, SendBuf};

use super::execute;
use super::plan::{ExchangePlan, Side, check_call};

/// Personalized exchange with one datatype per side.
///
/// # Safety
/// Every send block must be readable and every receive block writable; the
/// receive blocks must not overlap.
#[allow(clippy::too_many_arguments)]
pub async unsafe fn alltoallv_x<T: Transport>(
    t: &T,
    send: SendBuf,
    sendcounts: &[Count],
    sdispls: &[Aint],
    sendtype: T::Datatype,
    recv_ptr: u64,
    recvcounts: &[Count],
    rdispls: &[Aint],
    recvtype: T::Datatype,
    method: Method,
) -> Result<()> {
    let shape = CollectiveShape::AlltoallV;
    let send_ptr = check_call(t, shape, send, None)?;
    let plan = ExchangePlan {
        shape,
        send: Side::new(
            send_ptr,
            CountArg::PerPeer(sendcounts),
            TypeArg::Splat(sendtype),
            DisplArg::PerPeer(sdispls),
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
