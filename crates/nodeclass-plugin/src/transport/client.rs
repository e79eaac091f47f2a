//! Orchestrator-side client for driving a handler in tests.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use super::rpc::{RpcCall, RpcResponse};
use crate::protocol::RequestEnvelope;

/// A connection to a running handler.
#[derive(Debug)]
pub struct RpcClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    next_id: u64,
}

impl RpcClient {
    /// Connects to `addr`, retrying until `timeout` elapses so a freshly
    /// spawned handler has time to bind.
    ///
    /// # Errors
    ///
    /// Returns the last connection error once the timeout expires.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> io::Result<Self> {
        let deadline = Instant::now() + timeout;
        let stream = loop {
            match TcpStream::connect(addr) {
                Ok(stream) => break stream,
                Err(error) if Instant::now() >= deadline => return Err(error),
                Err(_) => thread::sleep(Duration::from_millis(20)),
            }
        };
        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
            next_id: 0,
        })
    }

    /// Sends one `Plugin.HandleRequest` call and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the call cannot be written or the response is
    /// missing or malformed.
    pub fn call(&mut self, request: &RequestEnvelope) -> io::Result<RpcResponse> {
        let call = RpcCall::handle_request(self.next_id, request)?;
        self.next_id += 1;
        let mut line = serde_json::to_vec(&call)?;
        line.push(b'\n');
        self.send_raw(&line)
    }

    /// Writes `line` verbatim and reads one response line.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails or no response arrives.
    pub fn send_raw(&mut self, line: &[u8]) -> io::Result<RpcResponse> {
        self.writer.write_all(line)?;
        self.writer.flush()?;
        let mut response = String::new();
        if self.reader.read_line(&mut response)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "handler closed the connection",
            ));
        }
        Ok(serde_json::from_str(&response)?)
    }
}
