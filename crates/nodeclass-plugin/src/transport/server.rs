//! Accepting the orchestrator connection and answering its calls.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::TRANSPORT_TARGET;
use super::errors::{ServeError, TransportError};
use super::framing::{Frame, FrameReader, MAX_LINE_BYTES};
use super::rpc::{RpcCall, RpcResponse};
use crate::context::HandlerContext;
use crate::dispatch::{RequestHandler, dispatch};

/// A bound handler listener that will serve exactly one connection.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Binds the handler port.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Bind`] when the address cannot be bound.
    pub fn bind(addr: SocketAddr) -> Result<Self, ServeError> {
        let listener =
            TcpListener::bind(addr).map_err(|source| ServeError::Bind { addr, source })?;
        info!(target: TRANSPORT_TARGET, %addr, "handler listening");
        Ok(Self { listener })
    }

    /// Returns the bound address, which differs from the requested one when
    /// port zero was used.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the socket address cannot be read.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one connection, stops listening, and serves calls until the
    /// peer closes. Returns the number of responses written.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Accept`] or [`ServeError::Connection`].
    pub fn serve_one<H>(self, handler: &H, context: &mut HandlerContext) -> Result<usize, ServeError>
    where
        H: RequestHandler + ?Sized,
    {
        let (stream, peer) = self.listener.accept().map_err(ServeError::Accept)?;
        drop(self.listener);
        info!(target: TRANSPORT_TARGET, %peer, "orchestrator connected");

        let served = serve_connection(&stream, &stream, handler, context)?;
        info!(target: TRANSPORT_TARGET, %peer, served, "orchestrator disconnected");
        Ok(served)
    }
}

/// Answers every call read from `reader` on `writer`, in order, until end of
/// stream. Returns the number of responses written.
///
/// # Errors
///
/// Returns a fatal [`TransportError`] when the stream itself fails.
pub fn serve_connection<R, W, H>(
    reader: R,
    mut writer: W,
    handler: &H,
    context: &mut HandlerContext,
) -> Result<usize, TransportError>
where
    R: Read,
    W: Write,
    H: RequestHandler + ?Sized,
{
    let mut frames = FrameReader::new(reader);
    let mut served = 0_usize;
    while let Some(frame) = frames.next_frame()? {
        let response = match frame {
            Frame::Oversized { size } => {
                let error = TransportError::CallTooLarge {
                    size,
                    max_size: MAX_LINE_BYTES,
                };
                warn!(target: TRANSPORT_TARGET, %error, "rejected call");
                RpcResponse::error(Value::Null, &error)
            }
            Frame::Line(line) if line.trim_ascii().is_empty() => continue,
            Frame::Line(line) => answer(&line, handler, context),
        };
        write_response(&mut writer, &response)?;
        served = served.saturating_add(1);
    }
    debug!(target: TRANSPORT_TARGET, served, "end of stream");
    Ok(served)
}

fn answer<H>(line: &[u8], handler: &H, context: &mut HandlerContext) -> RpcResponse
where
    H: RequestHandler + ?Sized,
{
    let call = match RpcCall::parse(line) {
        Ok(call) => call,
        Err(error) => {
            warn!(target: TRANSPORT_TARGET, %error, "rejected call");
            return RpcResponse::error(Value::Null, &error);
        }
    };
    let id = call.id().clone();
    debug!(target: TRANSPORT_TARGET, %id, method = call.method(), "received call");
    match call.into_request() {
        Ok(request) => RpcResponse::reply(id, dispatch(handler, context, &request)),
        Err(error) => {
            warn!(target: TRANSPORT_TARGET, %error, "rejected call");
            RpcResponse::error(id, &error)
        }
    }
}

fn write_response<W: Write>(writer: &mut W, response: &RpcResponse) -> Result<(), TransportError> {
    let mut line = serde_json::to_vec(response).map_err(TransportError::Encode)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}
