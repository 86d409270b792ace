use crate::convert::ConvertedVectors;
use crate::error::Result;
use crate::transport::{OwnedGraph, Transport};

use super::plan::ExchangePlan;

/// Both sides of a plan as composed-type entries, one per peer.
pub(super) struct Converted<'t, T: Transport> {
    send: ConvertedVectors<'t, T>,
    recv: ConvertedVectors<'t, T>,
}

/// Convert both sides. Local only; nothing is sent.
pub(super) fn prepare<'t, T: Transport>(
    t: &'t T,
    plan: &ExchangePlan<'_, T::Datatype>,
) -> Result<Converted<'t, T>> {
    let n = t.size() as usize;
    Ok(Converted {
        send: plan.send.convert(t, n)?,
        recv: plan.recv.convert(t, n)?,
    })
}

/// One neighbor exchange over the plan's graph.
///
/// # Safety
/// See [`execute`](super::execute).
pub(super) async unsafe fn exchange<T: Transport>(
    t: &T,
    plan: &ExchangePlan<'_, T::Datatype>,
    converted: &Converted<'_, T>,
) -> Result<()> {
    let send_blocks: Vec<_> = plan
        .topology
        .destinations
        .iter()
        .map(|&d| converted.send.block(d as usize))
        .collect();
    let recv_blocks: Vec<_> = plan
        .topology
        .sources
        .iter()
        .map(|&s| converted.recv.block(s as usize))
        .collect();

    let graph = OwnedGraph::create(t, &plan.topology).await?;
    unsafe {
        t.neighbor_alltoallw(
            graph.raw(),
            plan.send.addr,
            &send_blocks,
            plan.recv.addr,
            &recv_blocks,
        )
    }
    .await
}
