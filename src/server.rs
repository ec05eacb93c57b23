use crate::config::Config;
use crate::error::{Error, Result};
use crate::network::Connection;
use crate::storage::Store;
use mio::event::Event;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const LISTENER: Token = Token(0);

/// Handle for requesting shutdown from outside the event loop, e.g. a
/// signal handler. Setting it stops the loop within one poll timeout.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Signal the server to shut down gracefully
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Single-threaded Redis-compatible server.
///
/// One thread runs the whole accept/read/parse/dispatch/write cycle for
/// every connection, multiplexed through a mio `Poll`. The store is
/// touched only by that thread, so it carries no locks.
pub struct Server {
    config: Config,
    listener: TcpListener,
    poll: Poll,
    store: Store,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listener and arm the readiness notifier.
    ///
    /// Any socket or poll setup failure is fatal to startup and comes
    /// back as `Err` for the caller to abort on.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {e}")))?;

        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok(Self {
            config,
            listener,
            poll,
            store: Store::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address the listener actually bound to (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get a handle that can stop the running server.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Drive the event loop until shutdown is requested.
    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(self.config.event_capacity);
        let mut connections: HashMap<Token, (TcpStream, Connection)> = HashMap::new();
        let mut next_token = 1usize;
        let timeout = Duration::from_millis(self.config.poll_timeout_ms);

        info!("listening on {}", self.local_addr()?);

        while !self.shutdown.load(Ordering::Acquire) {
            match self.poll.poll(&mut events, Some(timeout)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_pending(&mut connections, &mut next_token),
                    token => self.handle_client(event, token, &mut connections),
                }
            }
        }

        for (_, (mut stream, _)) in connections.drain() {
            let _ = self.poll.registry().deregister(&mut stream);
        }

        info!("server stopped");
        Ok(())
    }

    /// Accept every pending connection; one readiness notification may
    /// cover several. Socket errors here are fatal to that connection
    /// only, never to the server.
    fn accept_pending(
        &mut self,
        connections: &mut HashMap<Token, (TcpStream, Connection)>,
        next_token: &mut usize,
    ) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    debug!("new connection from {addr}");

                    if self.config.tcp_nodelay {
                        if let Err(e) = stream.set_nodelay(true) {
                            error!("error configuring connection from {addr}: {e}");
                            continue;
                        }
                    }

                    let token = Token(*next_token);
                    *next_token += 1;

                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        error!("error registering connection from {addr}: {e}");
                        continue;
                    }

                    let connection = Connection::new(addr, self.config.connection_buffer_size);
                    connections.insert(token, (stream, connection));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("error accepting connection: {e}");
                    break;
                }
            }
        }
    }

    /// One read/dispatch/write cycle for a client readiness event.
    fn handle_client(
        &mut self,
        event: &Event,
        token: Token,
        connections: &mut HashMap<Token, (TcpStream, Connection)>,
    ) {
        let Some((stream, connection)) = connections.get_mut(&token) else {
            return;
        };
        let had_pending = connection.has_pending_output();

        if event.is_readable() {
            read_into(stream, connection, &mut self.store, self.config.connection_buffer_size);
        }

        // First write attempt happens eagerly; later ones on writability.
        if !connection.is_closed() {
            flush_output(stream, connection);
        }

        if connection.is_closed() {
            if let Some((mut stream, connection)) = connections.remove(&token) {
                let _ = self.poll.registry().deregister(&mut stream);
                debug!("dropped connection from {}", connection.addr());
            }
            return;
        }

        // Only watch for writability while output is actually queued;
        // edge-triggered write readiness would otherwise busy-loop.
        let has_pending = connection.has_pending_output();
        if has_pending != had_pending {
            let interest = if has_pending {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };
            if let Err(e) = self.poll.registry().reregister(stream, token, interest) {
                // Can no longer track this socket's readiness; give it up
                // without touching the rest of the loop.
                error!("error updating interest for {}: {e}", connection.addr());
                if let Some((mut stream, _)) = connections.remove(&token) {
                    let _ = self.poll.registry().deregister(&mut stream);
                }
            }
        }
    }
}

/// Drain all currently readable bytes into the connection, parsing and
/// dispatching as they arrive. Edge-triggered readiness only fires on
/// transitions, so reading must continue until WouldBlock.
fn read_into(stream: &mut TcpStream, connection: &mut Connection, store: &mut Store, buffer_size: usize) {
    let mut buffer = vec![0u8; buffer_size];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => {
                debug!("peer closed connection from {}", connection.addr());
                connection.close();
                break;
            }
            Ok(n) => connection.process_read(&buffer[..n], store),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                if e.kind() != ErrorKind::ConnectionReset {
                    error!("error reading from {}: {e}", connection.addr());
                }
                connection.close();
                break;
            }
        }
    }
}

/// Flush queued replies until the queue empties or the socket stops
/// accepting bytes. Partial progress is recorded so the next writable
/// event resumes mid-reply.
fn flush_output(stream: &mut TcpStream, connection: &mut Connection) {
    while let Some(pending) = connection.pending_output() {
        let pending_len = pending.len();
        match stream.write(pending) {
            Ok(n) => {
                connection.consume_output(n);
                if n < pending_len {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("error writing to {}: {e}", connection.addr());
                connection.close();
                break;
            }
        }
    }
}
