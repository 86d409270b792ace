//! Wide-count reductions.
//!
//! Counts within the native limit go straight to the transport. Larger
//! counts use one of two strategies:
//!
//! - [`ReduceStrategy::UserOp`]: the buffer is described by one composed
//!   datatype, and a user-defined operator decodes it on every invocation and
//!   replays the predefined operator over native-sized chunks.
//! - [`ReduceStrategy::Cleaver`]: the buffer is cut into native-sized chunks
//!   and each chunk is reduced with its own native call.

use std::sync::Arc;

use crate::codec::{decode, encode};
use crate::collective::scatter_x;
use crate::config::ReduceStrategy;
use crate::datatype::TypeSystem;
use crate::error::{BigCountError, Result, native_count};
use crate::transport::{OwnedOp, Transport, UserFunction};
use crate::types::{Aint, Count, Rank, ReduceOp, SendBuf, WideBuf};

/// Predefined operators with a chunked wide-count counterpart.
pub const WIDE_REDUCE_OPS: [ReduceOp; 10] = [
    ReduceOp::Sum,
    ReduceOp::Prod,
    ReduceOp::Min,
    ReduceOp::Max,
    ReduceOp::LAnd,
    ReduceOp::BAnd,
    ReduceOp::LOr,
    ReduceOp::BOr,
    ReduceOp::LXor,
    ReduceOp::BXor,
];

/// Element-wise predefined operators are all commutative.
fn wide_op_entry(op: ReduceOp) -> Result<(ReduceOp, bool)> {
    WIDE_REDUCE_OPS
        .iter()
        .find(|&&o| o == op)
        .map(|&o| (o, true))
        .ok_or(BigCountError::UnsupportedOp { op })
}

/// A predefined operator lifted to composed datatypes: the transport sees a
/// user-defined operator that reduces one composed item in native-sized
/// chunks. Freed on drop.
pub struct WideOp<'t, T: Transport> {
    op: ReduceOp,
    inner: OwnedOp<'t, T>,
}

impl<'t, T: Transport> WideOp<'t, T> {
    pub fn create(t: &'t T, op: ReduceOp) -> Result<Self> {
        let (op, commute) = wide_op_entry(op)?;
        let inner = OwnedOp::create(t, chunked_function::<T>(op), commute)?;
        Ok(Self { op, inner })
    }

    pub fn op(&self) -> ReduceOp {
        self.op
    }

    pub fn raw(&self) -> T::Op {
        self.inner.raw()
    }
}

/// User function that applies `op` to a composed datatype chunk by chunk.
fn chunked_function<T: Transport>(op: ReduceOp) -> UserFunction<T> {
    Arc::new(
        move |t: &T, in_ptr: u64, inout_ptr: u64, len: i32, datatype: T::Datatype| {
            if len != 1 {
                return Err(BigCountError::transport(format!(
                    "wide {op} expects one composed item per call, got {len}"
                )));
            }
            let (count, basetype) = decode(t, datatype)?;
            unsafe { chunked_reduce_local(t, in_ptr, inout_ptr, count, basetype, op) }
        },
    )
}

/// `inout = op(in, inout)` over `count` items using native-sized
/// `reduce_local` calls.
///
/// # Safety
/// Both pointers must hold `count` contiguous items of `basetype`.
unsafe fn chunked_reduce_local<T: Transport>(
    t: &T,
    in_ptr: u64,
    inout_ptr: u64,
    count: Count,
    basetype: T::Datatype,
    op: ReduceOp,
) -> Result<()> {
    let builtin = t.builtin_op(op);
    for chunk in chunks(t, count, basetype)? {
        unsafe {
            t.reduce_local(
                in_ptr + chunk.byte_offset,
                inout_ptr + chunk.byte_offset,
                chunk.count,
                basetype,
                builtin,
            )?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    byte_offset: u64,
    count: i32,
}

/// `count / nm` full chunks followed by one remainder chunk.
fn chunks<T: TypeSystem>(ts: &T, count: Count, basetype: T::Datatype) -> Result<Vec<Chunk>> {
    let nm = ts.native_max();
    let (_, extent) = ts.type_extent(basetype)?;
    let extent = u64::try_from(extent).map_err(|_| BigCountError::ZeroExtent { extent })?;
    let chunk_bytes = nm
        .checked_mul(extent)
        .ok_or(BigCountError::Overflow("chunk size"))?;
    let full = count / nm;
    let mut out = Vec::with_capacity(full as usize + 1);
    for i in 0..full {
        out.push(Chunk {
            byte_offset: i * chunk_bytes,
            count: native_count(nm)?,
        });
    }
    out.push(Chunk {
        byte_offset: full * chunk_bytes,
        count: native_count(count % nm)?,
    });
    Ok(out)
}

/// Reduce `count` items to `root`.
///
/// # Safety
/// Buffers must hold `count` contiguous items of `datatype`; `recv_ptr` is
/// only written at root.
#[allow(clippy::too_many_arguments)]
pub async unsafe fn reduce_x<T: Transport>(
    t: &T,
    strategy: ReduceStrategy,
    send: SendBuf,
    recv_ptr: u64,
    count: Count,
    datatype: T::Datatype,
    op: ReduceOp,
    root: Rank,
) -> Result<()> {
    if root >= t.size() {
        return Err(BigCountError::InvalidRank {
            rank: root,
            size: t.size(),
        });
    }
    if count <= t.native_max() {
        let n = native_count(count)?;
        return unsafe { t.reduce(send, recv_ptr, n, datatype, t.builtin_op(op), root) }.await;
    }

    tracing::debug!(rank = t.rank(), count, %op, ?strategy, "wide reduce");
    match strategy {
        ReduceStrategy::UserOp => {
            if send == SendBuf::InPlace {
                return Err(BigCountError::InPlaceUnsupported {
                    operation: "reduce_x",
                });
            }
            let wide_op = WideOp::create(t, op)?;
            let composed = encode(t, count, datatype)?;
            unsafe { t.reduce(send, recv_ptr, 1, composed.raw(), wide_op.raw(), root) }.await
        }
        ReduceStrategy::Cleaver => {
            let builtin = t.builtin_op(op);
            let is_root = t.rank() == root;
            for chunk in chunks(t, count, datatype)? {
                let send = match send {
                    // Only root may reduce in place; elsewhere the receive
                    // buffer holds the input.
                    SendBuf::InPlace if !is_root => SendBuf::Addr(recv_ptr + chunk.byte_offset),
                    other => other.offset(chunk.byte_offset),
                };
                unsafe {
                    t.reduce(
                        send,
                        recv_ptr + chunk.byte_offset,
                        chunk.count,
                        datatype,
                        builtin,
                        root,
                    )
                }
                .await?;
            }
            Ok(())
        }
    }
}

/// Reduce `count` items and leave the result at every rank.
///
/// # Safety
/// Buffers must hold `count` contiguous items of `datatype`.
pub async unsafe fn allreduce_x<T: Transport>(
    t: &T,
    strategy: ReduceStrategy,
    send: SendBuf,
    recv_ptr: u64,
    count: Count,
    datatype: T::Datatype,
    op: ReduceOp,
) -> Result<()> {
    if count <= t.native_max() {
        let n = native_count(count)?;
        return unsafe { t.allreduce(send, recv_ptr, n, datatype, t.builtin_op(op)) }.await;
    }

    tracing::debug!(rank = t.rank(), count, %op, ?strategy, "wide allreduce");
    match strategy {
        ReduceStrategy::UserOp => {
            if send == SendBuf::InPlace {
                return Err(BigCountError::InPlaceUnsupported {
                    operation: "allreduce_x",
                });
            }
            let wide_op = WideOp::create(t, op)?;
            let composed = encode(t, count, datatype)?;
            unsafe { t.allreduce(send, recv_ptr, 1, composed.raw(), wide_op.raw()) }.await
        }
        ReduceStrategy::Cleaver => {
            let builtin = t.builtin_op(op);
            for chunk in chunks(t, count, datatype)? {
                unsafe {
                    t.allreduce(
                        send.offset(chunk.byte_offset),
                        recv_ptr + chunk.byte_offset,
                        chunk.count,
                        datatype,
                        builtin,
                    )
                }
                .await?;
            }
            Ok(())
        }
    }
}

/// Reduce `recvcount * size` items and scatter equal blocks of the result.
///
/// Reduces into a temporary buffer at rank 0, then scatters `recvcount`
/// items to each rank. With [`SendBuf::InPlace`] the receive buffer holds
/// the full input.
///
/// # Safety
/// The input must hold `recvcount * size` items and `recv_ptr` room for
/// `recvcount` items of `datatype`.
pub async unsafe fn reduce_scatter_block_x<T: Transport>(
    t: &T,
    strategy: ReduceStrategy,
    send: SendBuf,
    recv_ptr: u64,
    recvcount: Count,
    datatype: T::Datatype,
    op: ReduceOp,
) -> Result<()> {
    let total = recvcount
        .checked_mul(Count::from(t.size()))
        .ok_or(BigCountError::Overflow("reduce-scatter total count"))?;
    let (_, extent) = t.type_extent(datatype)?;
    if extent <= 0 {
        return Err(BigCountError::ZeroExtent { extent });
    }

    let mut temp = Vec::new();
    if t.rank() == 0 {
        let bytes = Aint::try_from(total)
            .ok()
            .and_then(|n| n.checked_mul(extent))
            .and_then(|b| usize::try_from(b).ok())
            .ok_or(BigCountError::Overflow("reduce-scatter buffer"))?;
        temp.try_reserve_exact(bytes).map_err(|e| {
            BigCountError::transport_with_source("reduce-scatter buffer allocation", e)
        })?;
        temp.resize(bytes, 0u8);
    }
    let temp_ptr = temp.as_mut_ptr() as u64;

    let input = match send {
        SendBuf::InPlace => SendBuf::Addr(recv_ptr),
        other => other,
    };
    unsafe { reduce_x(t, strategy, input, temp_ptr, total, datatype, op, 0) }.await?;
    unsafe {
        scatter_x(
            t,
            WideBuf::new(temp_ptr, recvcount, datatype),
            WideBuf::new(recv_ptr, recvcount, datatype),
            0,
        )
    }
    .await
}
