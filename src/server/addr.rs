use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{Error, ErrorKind};

const UNIX_PREFIX: &str = "unix:";

/// Address that the server listens on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    /// IPv4 or IPv6 socket address
    Tcp(SocketAddr),
    /// Path of a Unix domain socket
    Unix(PathBuf),
}

impl ListenAddr {
    /// Listen on all IPv4 interfaces at the given port
    pub fn any(port: u16) -> Self {
        Self::Tcp(SocketAddr::from(([0, 0, 0, 0], port)))
    }
}

impl FromStr for ListenAddr {
    type Err = Error;

    /// Parse `ip:port`, `[ipv6]:port`, or `unix:<path>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(Error::new(ErrorKind::InvalidListenAddr, s));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        s.parse::<SocketAddr>()
            .map(Self::Tcp)
            .map_err(|_| Error::new(ErrorKind::InvalidListenAddr, s))
    }
}

impl From<SocketAddr> for ListenAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::Tcp(addr)
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{}", addr),
            Self::Unix(path) => write!(f, "{}{}", UNIX_PREFIX, path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ipv4() {
        let addr: ListenAddr = "127.0.0.1:8000".parse().unwrap();
        assert_eq!(ListenAddr::Tcp(SocketAddr::from(([127, 0, 0, 1], 8000))), addr);
    }

    #[test]
    fn parse_ipv6() {
        let addr: ListenAddr = "[::1]:8000".parse().unwrap();
        match addr {
            ListenAddr::Tcp(addr) => {
                assert!(addr.is_ipv6());
                assert_eq!(8000, addr.port());
            }
            ListenAddr::Unix(_) => panic!("expecting a tcp address"),
        }
    }

    #[test]
    fn parse_unix() {
        let addr: ListenAddr = "unix:/tmp/echo.sock".parse().unwrap();
        assert_eq!(ListenAddr::Unix(PathBuf::from("/tmp/echo.sock")), addr);
        assert_eq!("unix:/tmp/echo.sock", addr.to_string());
    }

    #[test]
    fn parse_invalid() {
        for s in &["", "unix:", "localhost", "127.0.0.1", "1.2.3.4:99999"] {
            let err = s.parse::<ListenAddr>().unwrap_err();
            assert_eq!(Some(ErrorKind::InvalidListenAddr), err.kind(), "{}", s);
        }
    }

    #[test]
    fn any_port() {
        assert_eq!("0.0.0.0:8000", ListenAddr::any(8000).to_string());
    }
}
