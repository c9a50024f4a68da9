use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// TCP endpoint the server listens on and the client connects to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerEndpoint {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerEndpoint {
    /// Builds an endpoint from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolves the endpoint to the first IPv4 or IPv6 socket address.
    ///
    /// # Errors
    ///
    /// Returns the resolver error, or `AddrNotAvailable` when the name
    /// resolves to nothing.
    pub fn resolve(&self) -> io::Result<SocketAddr> {
        let mut addrs = (self.host.as_str(), self.port).to_socket_addrs()?;
        addrs
            .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(formatter, "[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (host, port) = input
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(EndpointParseError::MissingHost(input.to_owned()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError::InvalidPort(port.to_owned()))?;
        Ok(Self::new(host, port))
    }
}

/// Errors encountered while parsing a [`ServerEndpoint`] from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointParseError {
    /// No `:port` suffix was present.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// The host part was empty.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// The port was not a number between 0 and 65535.
    #[error("invalid port '{0}'")]
    InvalidPort(String),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn displays_ipv4_endpoint() {
        assert_eq!(ServerEndpoint::new("127.0.0.1", 9000).to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn brackets_ipv6_hosts() {
        assert_eq!(ServerEndpoint::new("::1", 9000).to_string(), "[::1]:9000");
    }

    #[rstest]
    #[case::ipv4("127.0.0.1:9000", ServerEndpoint::new("127.0.0.1", 9000))]
    #[case::name("localhost:80", ServerEndpoint::new("localhost", 80))]
    #[case::ipv6("[::1]:4242", ServerEndpoint::new("::1", 4242))]
    fn parses_endpoints(#[case] input: &str, #[case] expected: ServerEndpoint) {
        assert_eq!(input.parse::<ServerEndpoint>(), Ok(expected));
    }

    #[rstest]
    #[case::no_port("localhost", EndpointParseError::MissingPort("localhost".to_owned()))]
    #[case::no_host(":80", EndpointParseError::MissingHost(":80".to_owned()))]
    #[case::bad_port("localhost:http", EndpointParseError::InvalidPort("http".to_owned()))]
    fn rejects_malformed_endpoints(#[case] input: &str, #[case] expected: EndpointParseError) {
        assert_eq!(input.parse::<ServerEndpoint>(), Err(expected));
    }

    #[test]
    fn resolves_loopback() {
        let addr = ServerEndpoint::new("127.0.0.1", 7000)
            .resolve()
            .expect("resolve loopback");
        assert_eq!(addr.port(), 7000);
        assert!(addr.ip().is_loopback());
    }
}
