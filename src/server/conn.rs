use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

use super::ListenAddr;
use crate::Result;

/// A byte stream accepted by the server
pub(crate) trait Connection: Read + Write + Send + 'static {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }
}

#[cfg(unix)]
impl Connection for UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        UnixStream::set_write_timeout(self, timeout)
    }
}

/// A non-blocking listener on either a TCP port or a Unix domain socket
#[derive(Debug)]
pub(crate) enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener, PathBuf),
}

impl Listener {
    pub(crate) fn bind(addr: &ListenAddr) -> Result<Self> {
        let listener = match addr {
            ListenAddr::Tcp(addr) => Self::Tcp(TcpListener::bind(addr)?),
            #[cfg(unix)]
            ListenAddr::Unix(path) => Self::Unix(UnixListener::bind(path)?, path.clone()),
            #[cfg(not(unix))]
            ListenAddr::Unix(_) => {
                return Err(crate::Error::new(
                    crate::ErrorKind::InvalidListenAddr,
                    "unix domain sockets are not supported on this platform",
                ))
            }
        };
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    /// Address that the listener is bound to, with the port resolved
    pub(crate) fn local_addr(&self) -> Result<ListenAddr> {
        match self {
            Self::Tcp(listener) => Ok(ListenAddr::Tcp(listener.local_addr()?)),
            #[cfg(unix)]
            Self::Unix(_, path) => Ok(ListenAddr::Unix(path.clone())),
        }
    }

    /// Accept a connection, returns `None` if no connection is pending
    pub(crate) fn accept(&self) -> io::Result<Option<(Box<dyn Connection>, String)>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, peer)| {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                Ok((Box::new(stream) as Box<dyn Connection>, peer.to_string()))
            }),
            #[cfg(unix)]
            Self::Unix(listener, path) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok((
                    Box::new(stream) as Box<dyn Connection>,
                    format!("unix:{}", path.display()),
                ))
            }),
        };
        match accepted {
            Ok(conn) => Ok(Some(conn)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(nonblocking),
            #[cfg(unix)]
            Self::Unix(listener, _) => listener.set_nonblocking(nonblocking),
        }
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Self::Unix(_, path) = self {
            std::fs::remove_file(path).ok();
        }
    }
}
