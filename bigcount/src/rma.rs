//! Wide-count one-sided operations.
//!
//! When every count involved fits the native limit the call is forwarded
//! unchanged. Otherwise every side (origin, result and target) is encoded
//! and issued with count 1.

use crate::codec::encode;
use crate::datatype::{OwnedDatatype, TypeSystem};
use crate::error::{Result, native_count};
use crate::p2p::{Narrowed, encode_always, narrow};
use crate::transport::Transport;
use crate::types::{NativeTarget, ReduceOp, WideBuf, WideTarget};

struct RmaArgs<'t, T: TypeSystem> {
    origin: Narrowed<'t, T>,
    result: Option<Narrowed<'t, T>>,
    target: NativeTarget<T::Datatype>,
    _target_type: Option<OwnedDatatype<'t, T>>,
}

fn narrow_rma<'t, T: TypeSystem>(
    ts: &'t T,
    origin: WideBuf<T::Datatype>,
    result: Option<WideBuf<T::Datatype>>,
    target: WideTarget<T::Datatype>,
) -> Result<RmaArgs<'t, T>> {
    let nm = ts.native_max();
    let fits = origin.count <= nm
        && target.count <= nm
        && result.is_none_or(|r| r.count <= nm);

    if fits {
        return Ok(RmaArgs {
            origin: narrow(ts, origin)?,
            result: result.map(|r| narrow(ts, r)).transpose()?,
            target: NativeTarget::new(
                target.rank,
                target.disp,
                native_count(target.count)?,
                target.datatype,
            ),
            _target_type: None,
        });
    }

    tracing::trace!(
        origin = origin.count,
        target = target.count,
        "encoding one-sided operation"
    );
    let target_type = encode(ts, target.count, target.datatype)?;
    Ok(RmaArgs {
        origin: encode_always(ts, origin)?,
        result: result.map(|r| encode_always(ts, r)).transpose()?,
        target: NativeTarget::new(target.rank, target.disp, 1, target_type.raw()),
        _target_type: Some(target_type),
    })
}

/// # Safety
/// `origin` must be valid; the target region must lie inside its window.
pub unsafe fn put_x<T: Transport>(
    t: &T,
    origin: WideBuf<T::Datatype>,
    target: WideTarget<T::Datatype>,
    win: &T::Window,
) -> Result<()> {
    let args = narrow_rma(t, origin, None, target)?;
    unsafe { t.put(args.origin.buf, args.target, win) }
}

/// # Safety
/// See [`put_x`].
pub unsafe fn get_x<T: Transport>(
    t: &T,
    origin: WideBuf<T::Datatype>,
    target: WideTarget<T::Datatype>,
    win: &T::Window,
) -> Result<()> {
    let args = narrow_rma(t, origin, None, target)?;
    unsafe { t.get(args.origin.buf, args.target, win) }
}

/// # Safety
/// See [`put_x`].
pub unsafe fn accumulate_x<T: Transport>(
    t: &T,
    origin: WideBuf<T::Datatype>,
    target: WideTarget<T::Datatype>,
    op: ReduceOp,
    win: &T::Window,
) -> Result<()> {
    let args = narrow_rma(t, origin, None, target)?;
    unsafe { t.accumulate(args.origin.buf, args.target, t.builtin_op(op), win) }
}

/// # Safety
/// See [`put_x`]; `result` receives the prior target contents.
pub unsafe fn get_accumulate_x<T: Transport>(
    t: &T,
    origin: WideBuf<T::Datatype>,
    result: WideBuf<T::Datatype>,
    target: WideTarget<T::Datatype>,
    op: ReduceOp,
    win: &T::Window,
) -> Result<()> {
    let args = narrow_rma(t, origin, Some(result), target)?;
    let result = args.result.as_ref().map(|r| r.buf).unwrap_or(args.origin.buf);
    unsafe { t.get_accumulate(args.origin.buf, result, args.target, t.builtin_op(op), win) }
}

/// # Safety
/// See [`put_x`].
pub unsafe fn rput_x<T: Transport>(
    t: &T,
    origin: WideBuf<T::Datatype>,
    target: WideTarget<T::Datatype>,
    win: &T::Window,
) -> Result<T::Request> {
    let args = narrow_rma(t, origin, None, target)?;
    unsafe { t.rput(args.origin.buf, args.target, win) }
}

/// # Safety
/// See [`put_x`].
pub unsafe fn rget_x<T: Transport>(
    t: &T,
    origin: WideBuf<T::Datatype>,
    target: WideTarget<T::Datatype>,
    win: &T::Window,
) -> Result<T::Request> {
    let args = narrow_rma(t, origin, None, target)?;
    unsafe { t.rget(args.origin.buf, args.target, win) }
}

/// # Safety
/// See [`put_x`].
pub unsafe fn raccumulate_x<T: Transport>(
    t: &T,
    origin: WideBuf<T::Datatype>,
    target: WideTarget<T::Datatype>,
    op: ReduceOp,
    win: &T::Window,
) -> Result<T::Request> {
    let args = narrow_rma(t, origin, None, target)?;
    unsafe { t.raccumulate(args.origin.buf, args.target, t.builtin_op(op), win) }
}

/// # Safety
/// See [`get_accumulate_x`].
pub unsafe fn rget_accumulate_x<T: Transport>(
    t: &T,
    origin: WideBuf<T::Datatype>,
    result: WideBuf<T::Datatype>,
    target: WideTarget<T::Datatype>,
    op: ReduceOp,
    win: &T::Window,
) -> Result<T::Request> {
    let args = narrow_rma(t, origin, Some(result), target)?;
    let result = args.result.as_ref().map(|r| r.buf).unwrap_or(args.origin.buf);
    unsafe { t.rget_accumulate(args.origin.buf, result, args.target, t.builtin_op(op), win) }
}
