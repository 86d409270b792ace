use crate::error::{BigCountError, Result};
use crate::p2p::narrow;
use crate::transport::Transport;
use crate::types::{NativeBuf, Rank, WideBuf};

use super::agree;

/// Uniform scatter: root sends `send.count` items to every rank, in rank
/// order.
///
/// Each side is narrowed on its own, so an oversized block travels as one
/// composed item and the root's stride between blocks stays
/// `send.count * extent`. `send` is only read at root.
///
/// # Safety
/// At root `send` must hold `size()` blocks; `recv` must hold `recv.count`
/// items on every rank.
pub async unsafe fn scatter_x<T: Transport>(
    t: &T,
    send: WideBuf<T::Datatype>,
    recv: WideBuf<T::Datatype>,
    root: Rank,
) -> Result<()> {
    if root >= t.size() {
        return Err(BigCountError::InvalidRank {
            rank: root,
            size: t.size(),
        });
    }
    let narrowed = narrow(t, recv).and_then(|r| {
        let s = if t.rank() == root {
            Some(narrow(t, send)?)
        } else {
            None
        };
        Ok((r, s))
    });
    let (narrowed_recv, narrowed_send) = agree(t, "scatter_x", narrowed).await?;
    let send_buf = match &narrowed_send {
        Some(n) => n.buf,
        None => NativeBuf::new(send.addr, 0, send.datatype),
    };
    unsafe { t.scatter(send_buf, narrowed_recv.buf, root) }.await
}
