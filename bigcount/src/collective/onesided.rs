use crate::error::{BigCountError, Result};
use crate::rma::put_x;
use crate::transport::{OwnedWindow, Transport};
use crate::types::{Aint, DataType, NativeBuf, WideTarget};

use super::plan::ExchangePlan;

/// Carries receive-side byte displacements ahead of the puts.
const DISPLACEMENT_TAG: i32 = 0x7b1d;

/// Expose the receive buffer, then put every send region into its
/// destination's window between two fences.
///
/// # Safety
/// See [`execute`](super::execute).
pub(super) async unsafe fn exchange<T: Transport>(
    t: &T,
    plan: &ExchangePlan<'_, T::Datatype>,
) -> Result<()> {
    let topo = &plan.topology;

    let mut window_size: Aint = 0;
    let mut published = Vec::with_capacity(topo.sources.len());
    for &s in &topo.sources {
        let (disp, len) = plan.recv.byte_region(t, s as usize)?;
        let end = disp
            .checked_add(len)
            .ok_or(BigCountError::Overflow("window size"))?;
        window_size = window_size.max(end);
        published.push(disp);
    }

    let remote = unsafe { swap_displacements(t, plan, &published) }.await?;
    tracing::trace!(rank = t.rank(), window_size, ?remote, "one-sided exchange");

    let win = unsafe { OwnedWindow::create(t, plan.recv.addr, window_size, 1) }.await?;
    win.fence().await?;
    for (&d, &disp) in topo.destinations.iter().zip(&remote) {
        let origin = plan.send.wide_buf(t, d as usize)?;
        let target = WideTarget::new(d, disp, origin.count, origin.datatype);
        unsafe { put_x(t, origin, target, win.raw()) }?;
    }
    win.fence().await
}

/// Send each source the byte offset its data lands at here, and learn the
/// same from each destination.
///
/// # Safety
/// Collective over the plan's topology.
async unsafe fn swap_displacements<T: Transport>(
    t: &T,
    plan: &ExchangePlan<'_, T::Datatype>,
    published: &[Aint],
) -> Result<Vec<Aint>> {
    let topo = &plan.topology;
    let aint = t.predefined(DataType::I64);
    let mut remote: Vec<Aint> = vec![0; topo.destinations.len()];

    let mut requests = Vec::with_capacity(topo.sources.len() + topo.destinations.len());
    for (slot, &d) in remote.iter_mut().zip(&topo.destinations) {
        let buf = NativeBuf::new(slot as *mut Aint as u64, 1, aint);
        requests.push(unsafe { t.irecv(buf, d, DISPLACEMENT_TAG) }?);
    }
    for (disp, &s) in published.iter().zip(&topo.sources) {
        let buf = NativeBuf::new(disp as *const Aint as u64, 1, aint);
        requests.push(unsafe { t.isend(buf, s, DISPLACEMENT_TAG) }?);
    }
    t.wait_all(requests).await?;
    Ok(remote)
}
