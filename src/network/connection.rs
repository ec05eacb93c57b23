use crate::protocol::command::dispatch;
use crate::protocol::resp::{Reply, RequestParser};
use crate::storage::Store;
use std::collections::VecDeque;
use std::net::SocketAddr;
use tracing::debug;

/// Protocol state for one client connection.
///
/// Owns the unparsed input bytes and the FIFO queue of already-encoded
/// replies. The reactor performs the actual socket reads and writes and
/// reports them here; this type decides what the bytes mean.
///
/// A malformed request produces a single error reply and the connection
/// stays open; only I/O failures or peer closure (observed by the
/// reactor, reported via [`Connection::close`]) end it.
pub struct Connection {
    addr: SocketAddr,

    parser: RequestParser,

    // Encoded replies awaiting transmission, oldest first. `front_written`
    // tracks how much of the front entry already went out, so a partial
    // write resumes without retransmitting.
    outbox: VecDeque<Vec<u8>>,
    front_written: usize,

    closed: bool,
}

impl Connection {
    pub fn new(addr: SocketAddr, buffer_size: usize) -> Self {
        Self {
            addr,
            parser: RequestParser::with_capacity(buffer_size),
            outbox: VecDeque::new(),
            front_written: 0,
            closed: false,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mark the connection as closing; the reactor drops it after the
    /// current cycle.
    pub fn close(&mut self) {
        if !self.closed {
            debug!("closing connection from {}", self.addr);
            self.closed = true;
        }
    }

    /// Consume freshly read bytes: buffer them, then parse and dispatch
    /// every complete command, queueing one reply per command in arrival
    /// order. Trailing bytes of a partial command stay buffered.
    pub fn process_read(&mut self, data: &[u8], store: &mut Store) {
        self.parser.feed(data);

        loop {
            match self.parser.next_command() {
                Ok(Some(command)) => {
                    let reply = dispatch(&command, store);
                    self.enqueue(&reply);
                }
                Ok(None) => break,
                Err(e) => {
                    // Malformed input: one error reply, connection stays
                    // open. The parser already dropped the desynced bytes.
                    debug!("protocol error from {}: {}", self.addr, e);
                    self.enqueue(&Reply::Error(e.to_string()));
                    break;
                }
            }
        }
    }

    fn enqueue(&mut self, reply: &Reply) {
        self.outbox.push_back(reply.encode());
    }

    /// The unsent tail of the oldest queued reply, if any.
    pub fn pending_output(&self) -> Option<&[u8]> {
        self.outbox.front().map(|front| &front[self.front_written..])
    }

    /// Whether any output is queued; drives the reactor's decision to
    /// watch for writability.
    pub fn has_pending_output(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Record that `n` bytes of the front entry were written.
    pub fn consume_output(&mut self, n: usize) {
        self.front_written += n;
        if let Some(front) = self.outbox.front() {
            if self.front_written >= front.len() {
                self.outbox.pop_front();
                self.front_written = 0;
            }
        }
    }
}
