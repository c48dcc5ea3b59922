#![allow(dead_code)]

use echo_kvs::proto::{
    read_frame, write_frame, EchoRequest, EchoResponse, OpCode, RpcRequest, RpcResponse, Status,
    ECHO_METHOD,
};
use echo_kvs::thread_pool::{SharedQueueThreadPool, ThreadPool};
use echo_kvs::{EchoService, ListenAddr, RpcServer, ServerHandle, ServerOptions, StorageHandle};
use prost::Message;
use std::io::{self, BufReader, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// A server running on a background thread with its storage in a temporary directory
pub struct TestServer {
    pub addr: ListenAddr,
    pub db_path: PathBuf,
    storage: Option<StorageHandle>,
    handle: ServerHandle,
    thread: Option<JoinHandle<()>>,
    _tmpdir: TempDir,
}

impl TestServer {
    pub fn start(echo_attachment: bool) -> Self {
        Self::start_at(
            ListenAddr::Tcp("127.0.0.1:0".parse().unwrap()),
            echo_attachment,
            ServerOptions::default(),
        )
    }

    pub fn start_at(addr: ListenAddr, echo_attachment: bool, options: ServerOptions) -> Self {
        Self::start_in(TempDir::new().unwrap(), addr, echo_attachment, options)
    }

    pub fn start_in(
        tmpdir: TempDir,
        addr: ListenAddr,
        echo_attachment: bool,
        options: ServerOptions,
    ) -> Self {
        Self::start_with_threads(tmpdir, addr, echo_attachment, options, 4)
    }

    pub fn start_with_threads(
        tmpdir: TempDir,
        addr: ListenAddr,
        echo_attachment: bool,
        options: ServerOptions,
        threads: u32,
    ) -> Self {
        let db_path = tmpdir.path().join("db");
        let storage = StorageHandle::open(&db_path, &logger()).unwrap();

        let service = EchoService::new(storage.engine(), echo_attachment, Some(logger()));
        let pool = SharedQueueThreadPool::new(threads).unwrap();
        let server = RpcServer::bind(&addr, service, pool, options, Some(logger())).unwrap();

        let addr = server.local_addr().clone();
        let handle = server.handle();
        let thread = thread::spawn(move || server.run().unwrap());
        Self {
            addr,
            db_path,
            storage: Some(storage),
            handle,
            thread: Some(thread),
            _tmpdir: tmpdir,
        }
    }

    pub fn connect(&self) -> Client {
        Client::connect(&self.addr)
    }

    /// Stop the server, wait for it to finish, then close the storage
    pub fn shutdown(mut self) -> PathBuf {
        self.stop_and_join();
        if let Some(storage) = self.storage.take() {
            storage.close();
        }
        self.db_path.clone()
    }

    /// Number of references to the engine besides the storage handle's own
    pub fn engine_refs(&self) -> usize {
        let storage = self.storage.as_ref().expect("storage was closed");
        let engine = storage.engine();
        Arc::strong_count(&engine) - 2
    }

    pub fn stop_and_join(&mut self) {
        self.handle.stop();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

pub trait Stream: Read + Write + Send {}
impl<T> Stream for T where T: Read + Write + Send {}

/// A connection that sends calls one after another
pub struct Client {
    reader: BufReader<Box<dyn Stream>>,
}

impl Client {
    pub fn connect(addr: &ListenAddr) -> Self {
        Self::try_connect(addr).unwrap()
    }

    pub fn try_connect(addr: &ListenAddr) -> io::Result<Self> {
        let stream: Box<dyn Stream> = match addr {
            ListenAddr::Tcp(addr) => {
                let stream = TcpStream::connect(addr)?;
                stream.set_read_timeout(Some(Duration::from_secs(10)))?;
                Box::new(stream)
            }
            #[cfg(unix)]
            ListenAddr::Unix(path) => {
                let stream = UnixStream::connect(path)?;
                stream.set_read_timeout(Some(Duration::from_secs(10)))?;
                Box::new(stream)
            }
            #[cfg(not(unix))]
            ListenAddr::Unix(_) => unreachable!(),
        };
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Connect to a server that may still be starting up
    pub fn connect_with_retry(addr: &ListenAddr, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        loop {
            match Self::try_connect(addr) {
                Ok(client) => return client,
                Err(err) if Instant::now() >= deadline => panic!("could not connect: {}", err),
                Err(_) => thread::sleep(Duration::from_millis(50)),
            }
        }
    }

    /// Send one frame and wait for the reply, returns `None` if the server closed the connection
    pub fn try_call_raw(&mut self, request: &RpcRequest) -> Option<RpcResponse> {
        if write_frame(self.reader.get_mut(), request).is_err() {
            return None;
        }
        read_frame(&mut self.reader).ok().flatten()
    }

    pub fn call_raw(&mut self, request: &RpcRequest) -> RpcResponse {
        self.try_call_raw(request)
            .expect("server closed the connection")
    }

    pub fn echo_with_attachment(
        &mut self,
        op: i32,
        key: &[u8],
        value: &[u8],
        attachment: &[u8],
    ) -> (RpcResponse, EchoResponse) {
        let mut payload = vec![];
        EchoRequest {
            op,
            key: key.to_vec(),
            value: value.to_vec(),
        }
        .encode(&mut payload)
        .unwrap();

        let response = self.call_raw(&RpcRequest {
            method: ECHO_METHOD.to_string(),
            payload,
            attachment: attachment.to_vec(),
        });
        let reply = EchoResponse::decode(response.payload.as_slice()).unwrap();
        (response, reply)
    }

    pub fn echo(&mut self, op: i32, key: &[u8], value: &[u8]) -> EchoResponse {
        let (response, reply) = self.echo_with_attachment(op, key, value, b"");
        assert_eq!(0, response.error_code, "{}", response.error_text);
        reply
    }

    pub fn write(&mut self, key: &[u8], value: &[u8]) -> Option<Status> {
        Status::from_i32(self.echo(OpCode::Write.into(), key, value).status)
    }

    pub fn read(&mut self, key: &[u8]) -> (Option<Status>, Vec<u8>) {
        let reply = self.echo(OpCode::Read.into(), key, b"");
        (Status::from_i32(reply.status), reply.value)
    }
}
