//! Wide-count point-to-point operations.

use crate::codec::encode;
use crate::datatype::{OwnedDatatype, TypeSystem};
use crate::error::{Result, native_count};
use crate::transport::Transport;
use crate::types::{NativeBuf, Rank, WideBuf};

/// A wide buffer expressed at native width, plus the composed datatype that
/// must outlive the native call when one was needed.
pub(crate) struct Narrowed<'t, T: TypeSystem> {
    pub buf: NativeBuf<T::Datatype>,
    _composed: Option<OwnedDatatype<'t, T>>,
}

/// Pass counts within the limit through unchanged; encode larger ones as
/// count 1 of a composed datatype.
pub(crate) fn narrow<'t, T: TypeSystem>(
    ts: &'t T,
    buf: WideBuf<T::Datatype>,
) -> Result<Narrowed<'t, T>> {
    if buf.count <= ts.native_max() {
        return Ok(Narrowed {
            buf: NativeBuf::new(buf.addr, native_count(buf.count)?, buf.datatype),
            _composed: None,
        });
    }
    encode_always(ts, buf)
}

/// Encode regardless of size.
pub(crate) fn encode_always<'t, T: TypeSystem>(
    ts: &'t T,
    buf: WideBuf<T::Datatype>,
) -> Result<Narrowed<'t, T>> {
    let composed = encode(ts, buf.count, buf.datatype)?;
    Ok(Narrowed {
        buf: NativeBuf::new(buf.addr, 1, composed.raw()),
        _composed: Some(composed),
    })
}

/// Start a send of `buf.count` items, which may exceed the native limit.
///
/// # Safety
/// `buf` must stay valid until the request completes.
pub unsafe fn isend_x<T: Transport>(
    t: &T,
    buf: WideBuf<T::Datatype>,
    dest: Rank,
    tag: i32,
) -> Result<T::Request> {
    let narrowed = narrow(t, buf)?;
    unsafe { t.isend(narrowed.buf, dest, tag) }
}

/// Start a receive of up to `buf.count` items.
///
/// # Safety
/// `buf` must stay valid and unaliased until the request completes.
pub unsafe fn irecv_x<T: Transport>(
    t: &T,
    buf: WideBuf<T::Datatype>,
    source: Rank,
    tag: i32,
) -> Result<T::Request> {
    let narrowed = narrow(t, buf)?;
    unsafe { t.irecv(narrowed.buf, source, tag) }
}

/// # Safety
/// See [`isend_x`].
pub async unsafe fn send_x<T: Transport>(
    t: &T,
    buf: WideBuf<T::Datatype>,
    dest: Rank,
    tag: i32,
) -> Result<()> {
    let request = unsafe { isend_x(t, buf, dest, tag) }?;
    t.wait(request).await
}

/// # Safety
/// See [`irecv_x`].
pub async unsafe fn recv_x<T: Transport>(
    t: &T,
    buf: WideBuf<T::Datatype>,
    source: Rank,
    tag: i32,
) -> Result<()> {
    let request = unsafe { irecv_x(t, buf, source, tag) }?;
    t.wait(request).await
}
