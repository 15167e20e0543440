//! Operation envelope
//!
//! An [`Operation`] is one RPC method: its opnum, its name and the codecs
//! for both directions. Client and server share the same operation type;
//! user code sees the narrower request/response value types obtained
//! through [`OperationRequest`] and [`OperationResponse`].

use crate::Result;
use bytes::Bytes;
use midl_ndr::{NdrContext, NdrReader, NdrWriter};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Direction a prepare step runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// One RPC method.
///
/// `prepare_*` run immediately before the matching `marshal_*` and fill
/// size-correlated fields (counts, lengths) from the data they describe.
pub trait Operation: Send + Sync {
    fn opnum(&self) -> u16;

    /// Fully qualified name, e.g. `/IRemUnknown/v0/RemAddRef`.
    fn op_name(&self) -> &'static str;

    fn prepare_request(&mut self) -> Result<()> {
        Ok(())
    }

    fn prepare_response(&mut self) -> Result<()> {
        Ok(())
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;

    fn unmarshal_request(&mut self, r: &mut NdrReader) -> Result<()>;

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;

    fn unmarshal_response(&mut self, r: &mut NdrReader) -> Result<()>;

    /// Trailing status word of the response. Zero means success.
    fn status(&self) -> i32 {
        0
    }
}

type HookFn<T> = dyn Fn(&mut T, Direction) -> Result<()> + Send + Sync;

/// Optional callback run after an operation's own prepare step.
///
/// Lets a caller adjust fields just before marshaling without changing the
/// operation's codec.
pub struct PrepareHook<T>(Arc<HookFn<T>>);

impl<T> PrepareHook<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut T, Direction) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, op: &mut T, direction: Direction) -> Result<()> {
        (self.0)(op, direction)
    }
}

impl<T> Clone for PrepareHook<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for PrepareHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrepareHook")
    }
}

/// Run `hook` if one is set.
///
/// Takes the hook by value so the operation it lives in can be borrowed
/// mutably: `run_hook(self.hook.clone(), self, Direction::Request)`.
pub fn run_hook<T>(hook: Option<PrepareHook<T>>, op: &mut T, direction: Direction) -> Result<()> {
    match hook {
        Some(hook) => hook.call(op, direction),
        None => Ok(()),
    }
}

/// Request-side value type of an operation.
///
/// Both projections are total.
pub trait OperationRequest: Sized {
    type Op: Operation;

    /// Build an operation carrying this request (client side).
    fn into_op(self) -> Self::Op;

    /// Extract the request from a decoded operation (server side).
    fn from_op(op: &Self::Op) -> Self;
}

/// Response-side value type of an operation.
pub trait OperationResponse: Sized {
    type Op: Operation;

    /// Copy the out-parameters into `op` for marshaling (server side).
    fn into_op(self, op: &mut Self::Op);

    /// Take the out-parameters of a decoded operation (client side).
    fn from_op(op: Self::Op) -> Self;
}

/// Run the request prepare step and encode the request stub.
pub fn marshal_request(op: &mut dyn Operation, ctx: NdrContext) -> Result<Bytes> {
    op.prepare_request()?;
    let op: &dyn Operation = op;
    let mut w = NdrWriter::with_context(ctx);
    op.marshal_request(&mut w)?;
    let stub = w.finish()?;
    trace!(op = op.op_name(), len = stub.len(), "request marshaled");
    Ok(stub)
}

/// Run the response prepare step and encode the response stub.
pub fn marshal_response(op: &mut dyn Operation, ctx: NdrContext) -> Result<Bytes> {
    op.prepare_response()?;
    let op: &dyn Operation = op;
    let mut w = NdrWriter::with_context(ctx);
    op.marshal_response(&mut w)?;
    let stub = w.finish()?;
    trace!(op = op.op_name(), len = stub.len(), "response marshaled");
    Ok(stub)
}

pub fn unmarshal_request(op: &mut dyn Operation, stub: Bytes, ctx: NdrContext) -> Result<()> {
    let mut r = NdrReader::with_context(stub, ctx);
    op.unmarshal_request(&mut r)?;
    trace_trailing(op, &r);
    Ok(())
}

pub fn unmarshal_response(op: &mut dyn Operation, stub: Bytes, ctx: NdrContext) -> Result<()> {
    let mut r = NdrReader::with_context(stub, ctx);
    op.unmarshal_response(&mut r)?;
    trace_trailing(op, &r);
    Ok(())
}

fn trace_trailing(op: &dyn Operation, r: &NdrReader) {
    if !r.is_empty() {
        trace!(
            op = op.op_name(),
            trailing = r.remaining(),
            "ignoring bytes after stub"
        );
    }
}
