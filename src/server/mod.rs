//! Blocking RPC server that reads framed calls from its connections and routes them to a service
mod addr;
mod conn;

pub use addr::ListenAddr;

use std::io::{self, BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use self::conn::{Connection, Listener};
use crate::proto::{error_code, read_frame, write_frame, RpcRequest, RpcResponse};
use crate::service::{Controller, Done, Service};
use crate::thread_pool::ThreadPool;
use crate::Result;

/// How often the acceptor checks for new connections and for the stop signal
const ACCEPT_TICK: Duration = Duration::from_millis(20);
/// How often a blocked read checks for the stop signal
const POLL_TICK: Duration = Duration::from_millis(50);
/// Longest time a frame may take to arrive once its first byte was read, or to be sent
const FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// Options of the RPC server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Close a connection when nothing is read from it for this long, never closed if `None`
    pub idle_timeout: Option<Duration>,
    /// How long the server waits for its connections to finish after being stopped
    pub logoff: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            logoff: Duration::from_millis(2000),
        }
    }
}

/// Handle for stopping a running server from another thread
#[derive(Debug, Clone)]
pub struct ServerHandle {
    stopping: Arc<AtomicBool>,
}

impl ServerHandle {
    /// Ask the server to stop accepting connections and requests
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    /// Return `true` if the server was asked to stop
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

/// A server that listens for calls and runs each of them on a thread pool.
///
/// Every connection is read by a thread of its own, so idle keep-alive connections never occupy
/// the pool. The pool only runs decoded calls.
#[derive(Debug)]
pub struct RpcServer<S, P>
where
    S: Service,
    P: ThreadPool,
{
    listener: Listener,
    local_addr: ListenAddr,
    shared: Arc<Shared<S>>,
    active: Arc<AtomicUsize>,
    pool: Arc<P>,
    logger: slog::Logger,
}

#[derive(Debug)]
struct Shared<S> {
    service: S,
    options: ServerOptions,
    stopping: Arc<AtomicBool>,
    // set once logoff expired, open connections drop whatever they are reading
    closed: AtomicBool,
}

impl<S, P> RpcServer<S, P>
where
    S: Service,
    P: ThreadPool,
{
    /// Bind the server to the given address. Calls are served once `run` is called.
    pub fn bind<L>(
        addr: &ListenAddr,
        service: S,
        pool: P,
        options: ServerOptions,
        logger: Option<L>,
    ) -> Result<Self>
    where
        L: Into<slog::Logger>,
    {
        let logger = logger.map(|l| l.into()).unwrap_or_else(default_logger);
        let listener = Listener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let logger = logger.new(o!("addr" => local_addr.to_string()));

        let shared = Arc::new(Shared {
            service,
            options,
            stopping: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
        });
        Ok(Self {
            listener,
            local_addr,
            shared,
            active: Arc::new(AtomicUsize::new(0)),
            pool: Arc::new(pool),
            logger,
        })
    }

    /// Address that the server is bound to
    pub fn local_addr(&self) -> &ListenAddr {
        &self.local_addr
    }

    /// Get a handle for stopping the server
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            stopping: Arc::clone(&self.shared.stopping),
        }
    }

    /// Accept connections until the server is stopped, then wait for the open connections to
    /// finish for at most the logoff duration.
    ///
    /// Connections still open after the logoff are dropped. When this returns, no connection
    /// thread and no queued call holds on to the service anymore.
    pub fn run(self) -> Result<()> {
        let Self {
            listener,
            shared,
            active,
            pool,
            logger,
            ..
        } = self;
        info!(logger, "Starting key-value store server");

        while !shared.stopping.load(Ordering::SeqCst) {
            let (conn, peer) = match listener.accept() {
                Ok(Some(accepted)) => accepted,
                Ok(None) => {
                    thread::sleep(ACCEPT_TICK);
                    continue;
                }
                Err(err) => {
                    error!(logger, "Could not accept connection"; "error" => %err);
                    thread::sleep(ACCEPT_TICK);
                    continue;
                }
            };

            let shared = Arc::clone(&shared);
            let pool = Arc::clone(&pool);
            let active = ActiveConnection::new(&active);
            let logger = logger.new(o!("peer" => peer.clone()));
            info!(logger, "Peer connected");

            let spawned = thread::Builder::new()
                .name("echo-kvs-conn".to_string())
                .spawn({
                    let logger = logger.clone();
                    move || {
                        if let Err(err) = serve_connection(&shared, &*pool, conn, &peer, &logger) {
                            error!(logger, "Could not handle client"; "error" => %err);
                        }
                        // the connection stops being counted only after its references are gone
                        drop(shared);
                        drop(pool);
                        info!(logger, "Peer disconnected");
                        drop(active);
                    }
                });
            if let Err(err) = spawned {
                error!(logger, "Could not spawn connection thread"; "error" => %err);
            }
        }

        // refuse new connections while the open ones are finishing
        drop(listener);
        let logoff = shared.options.logoff;
        info!(logger, "Stopping server"; "logoff_ms" => logoff.as_millis() as u64);

        let deadline = Instant::now() + logoff;
        while active.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            thread::sleep(ACCEPT_TICK);
        }

        let remaining = active.load(Ordering::SeqCst);
        if remaining > 0 {
            warn!(logger, "Logoff expired, closing open connections"; "connections" => remaining);
            shared.closed.store(true, Ordering::SeqCst);
            // every blocked read gives up within a poll tick
            while active.load(Ordering::SeqCst) > 0 {
                thread::sleep(POLL_TICK);
            }
        }
        drop(pool);
        info!(logger, "Server stopped");
        Ok(())
    }
}

/// Counts a connection as open for as long as it lives
struct ActiveConnection {
    active: Arc<AtomicUsize>,
}

impl ActiveConnection {
    fn new(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn serve_connection<S, P>(
    shared: &Arc<Shared<S>>,
    pool: &P,
    conn: Box<dyn Connection>,
    peer: &str,
    logger: &slog::Logger,
) -> Result<()>
where
    S: Service,
    P: ThreadPool,
{
    conn.set_read_timeout(Some(POLL_TICK))?;
    conn.set_write_timeout(Some(FRAME_TIMEOUT))?;
    let mut reader = BufReader::new(conn);
    loop {
        if !wait_for_request(shared, &mut reader, logger)? {
            return Ok(());
        }

        let mut frame = FrameReader {
            reader: &mut reader,
            shared: shared.as_ref(),
            deadline: Instant::now() + FRAME_TIMEOUT,
        };
        let request: RpcRequest = match read_frame(&mut frame)? {
            Some(request) => request,
            None => return Ok(()),
        };

        let stopping = shared.stopping.load(Ordering::SeqCst);
        let response = if stopping {
            RpcResponse {
                error_code: error_code::ELOGOFF,
                error_text: "Server is stopping".to_string(),
                ..RpcResponse::default()
            }
        } else {
            call_in_pool(shared, pool, peer, request, logger)
        };
        write_frame(reader.get_mut(), &response)?;

        if stopping {
            return Ok(());
        }
    }
}

/// Block until the next frame starts arriving. Returns `false` if the connection should be
/// closed instead, because the peer hung up, the connection was idle for too long, or the
/// server is stopping.
fn wait_for_request<S>(
    shared: &Shared<S>,
    reader: &mut BufReader<Box<dyn Connection>>,
    logger: &slog::Logger,
) -> Result<bool> {
    let idle_since = Instant::now();
    loop {
        match reader.fill_buf() {
            Ok(buf) => return Ok(!buf.is_empty()),
            Err(err) if is_timeout(&err) => {
                if shared.stopping.load(Ordering::SeqCst) {
                    return Ok(false);
                }
                if let Some(idle_timeout) = shared.options.idle_timeout {
                    if idle_since.elapsed() >= idle_timeout {
                        info!(logger, "Closing idle connection");
                        return Ok(false);
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock || err.kind() == io::ErrorKind::TimedOut
}

/// Reads the body of a frame off a polling connection. A read fails once the server drops its
/// open connections, or once the frame took longer than its deadline.
struct FrameReader<'a, S> {
    reader: &'a mut BufReader<Box<dyn Connection>>,
    shared: &'a Shared<S>,
    deadline: Instant,
}

impl<S> Read for FrameReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.reader.read(buf) {
                Err(err) if is_timeout(&err) => {
                    if self.shared.closed.load(Ordering::SeqCst) {
                        return Err(io::Error::new(
                            io::ErrorKind::ConnectionAborted,
                            "server dropped the connection",
                        ));
                    }
                    if Instant::now() >= self.deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "frame was not received in time",
                        ));
                    }
                }
                res => return res,
            }
        }
    }
}

/// Run the call on the pool and wait for its response
fn call_in_pool<S, P>(
    shared: &Arc<Shared<S>>,
    pool: &P,
    peer: &str,
    request: RpcRequest,
    logger: &slog::Logger,
) -> RpcResponse
where
    S: Service,
    P: ThreadPool,
{
    let (response_tx, response_rx) = mpsc::channel();
    let job = {
        let shared = Arc::clone(shared);
        let peer = peer.to_string();
        let logger = logger.clone();
        move || {
            let response = handle_call(&shared.service, &peer, request, &logger);
            // the reader may return as soon as it receives the response
            drop(shared);
            response_tx.send(response).ok();
        }
    };
    pool.spawn(job);

    match response_rx.recv() {
        Ok(response) => response,
        Err(_) => {
            error!(logger, "Call was dropped before producing a response");
            RpcResponse {
                error_code: error_code::EINTERNAL,
                error_text: "Call was dropped".to_string(),
                ..RpcResponse::default()
            }
        }
    }
}

fn handle_call<S>(
    service: &S,
    peer: &str,
    request: RpcRequest,
    logger: &slog::Logger,
) -> RpcResponse
where
    S: Service,
{
    if !service.has_method(&request.method) {
        warn!(logger, "Unknown method"; "method" => %request.method);
        return RpcResponse {
            error_code: error_code::ENOMETHOD,
            error_text: format!("Unknown method `{}'", request.method),
            ..RpcResponse::default()
        };
    }

    let (done_tx, done_rx) = mpsc::channel();
    let done = Done::new(move || {
        done_tx.send(()).ok();
    });
    let mut cntl = Controller::new(peer, request.attachment);
    let mut payload = vec![];
    service.call(&request.method, &mut cntl, &request.payload, &mut payload, done);

    if done_rx.recv().is_err() {
        error!(logger, "Call finished without signaling its completion");
        return RpcResponse {
            error_code: error_code::EINTERNAL,
            error_text: "Call was never completed".to_string(),
            ..RpcResponse::default()
        };
    }

    match cntl.failure() {
        Some((code, text)) => RpcResponse {
            error_code: code,
            error_text: text.to_string(),
            ..RpcResponse::default()
        },
        None => RpcResponse {
            error_code: error_code::OK,
            error_text: String::new(),
            payload,
            attachment: cntl.take_response_attachment(),
        },
    }
}

fn default_logger() -> slog::Logger {
    use slog::Drain;
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, o!())
}
