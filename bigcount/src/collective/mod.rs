//! Irregular collectives with wide counts.
//!
//! Every shape is normalized into an [`ExchangePlan`](plan::ExchangePlan) and
//! then carried out by one of three strategies selected by [`Method`]:
//! a single neighbor exchange over a graph communicator, wide point-to-point
//! messages along every edge, or puts into a window over the receive buffer.

mod allgatherv;
mod alltoallv;
mod alltoallw;
mod gatherv;
mod neighbor;
mod onesided;
mod p2p;
mod plan;
mod scatter;
mod scatterv;

pub use allgatherv::allgatherv_x;
pub use alltoallv::alltoallv_x;
pub use alltoallw::alltoallw_x;
pub use gatherv::gatherv_x;
pub use scatter::scatter_x;
pub use scatterv::scatterv_x;

use crate::config::Method;
use crate::error::{BigCountError, Result};
use crate::transport::Transport;
use crate::types::{DataType, ReduceOp, SendBuf};
use plan::ExchangePlan;

/// Run `plan` with the chosen strategy.
///
/// Local preparation happens first on every rank; the ranks then agree on
/// its outcome so that a failure on one rank fails the call on all of them
/// before any data moves.
///
/// # Safety
/// Every region the plan describes must be valid for the duration of the
/// call; receive regions must not overlap.
pub(crate) async unsafe fn execute<T: Transport>(
    t: &T,
    plan: &ExchangePlan<'_, T::Datatype>,
    method: Method,
) -> Result<()> {
    tracing::debug!(
        rank = t.rank(),
        shape = %plan.shape,
        %method,
        sources = plan.topology.sources.len(),
        destinations = plan.topology.destinations.len(),
        "irregular collective"
    );
    let operation = plan.shape.name();
    let local = plan.validate(t);
    match method {
        Method::TopologyRouted => {
            let prepared = local.and_then(|()| neighbor::prepare(t, plan));
            let converted = agree(t, operation, prepared).await?;
            unsafe { neighbor::exchange(t, plan, &converted) }.await
        }
        Method::PointToPoint => {
            agree(t, operation, local).await?;
            unsafe { p2p::exchange(t, plan) }.await
        }
        Method::OneSided => {
            agree(t, operation, local).await?;
            unsafe { onesided::exchange(t, plan) }.await
        }
    }
}

/// Combine every rank's local outcome with a native max-reduction of a
/// failure flag.
///
/// A rank that failed returns its own error; the others return
/// [`BigCountError::PeerFailed`].
pub(crate) async fn agree<T: Transport, V>(
    t: &T,
    operation: &'static str,
    local: Result<V>,
) -> Result<V> {
    let failed = i32::from(local.is_err());
    let mut any_failed = 0i32;
    let flag = t.predefined(DataType::I32);
    let agreed = unsafe {
        t.allreduce(
            SendBuf::Addr(&failed as *const i32 as u64),
            &mut any_failed as *mut i32 as u64,
            1,
            flag,
            t.builtin_op(ReduceOp::Max),
        )
    }
    .await;
    let value = local?;
    agreed?;
    if any_failed != 0 {
        tracing::debug!(rank = t.rank(), operation, "peer failed local preparation");
        return Err(BigCountError::PeerFailed { operation });
    }
    Ok(value)
}
