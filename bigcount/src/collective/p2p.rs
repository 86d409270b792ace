use crate::error::Result;
use crate::p2p::{irecv_x, isend_x};
use crate::transport::Transport;

use super::plan::ExchangePlan;

/// Tag reserved for irregular collective traffic on the point-to-point
/// channel.
pub(super) const VCOLL_TAG: i32 = 0x7b1c;

/// Post every receive, then every send, then wait for all of them.
///
/// # Safety
/// See [`execute`](super::execute).
pub(super) async unsafe fn exchange<T: Transport>(
    t: &T,
    plan: &ExchangePlan<'_, T::Datatype>,
) -> Result<()> {
    let topo = &plan.topology;
    let mut requests = Vec::with_capacity(topo.sources.len() + topo.destinations.len());
    for &s in &topo.sources {
        let buf = plan.recv.wide_buf(t, s as usize)?;
        requests.push(unsafe { irecv_x(t, buf, s, VCOLL_TAG) }?);
    }
    for &d in &topo.destinations {
        let buf = plan.send.wide_buf(t, d as usize)?;
        requests.push(unsafe { isend_x(t, buf, d, VCOLL_TAG) }?);
    }
    t.wait_all(requests).await
}
