//! Endpoint URIs.
//!
//! Servers and clients are addressed by a small URI dialect:
//!
//! - `tcpromp://host:port` (or the `romp://` shorthand): TCP stream
//! - `udpromp://host:port`: datagram, best-effort only
//! - `unixromp:///absolute/path`: Unix domain stream socket
//!
//! An empty host means "every interface" when listening and is rejected
//! when connecting. Parse failures are configuration errors and surface
//! synchronously from the constructor that received the URI.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::protocol::error::{RompError, Result};

/// A parsed transport address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: Option<String>, port: u16 },
    Udp { host: Option<String>, port: u16 },
    Unix { path: PathBuf },
}

impl Endpoint {
    /// Parses an endpoint URI. Equivalent to the `FromStr` impl.
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| RompError::Config(format!("not an endpoint URI: {uri}")))?;

        match scheme {
            "romp" | "tcpromp" => {
                let (host, port) = parse_host_port(rest)?;
                Ok(Endpoint::Tcp { host, port })
            }
            "udpromp" => {
                let (host, port) = parse_host_port(rest)?;
                Ok(Endpoint::Udp { host, port })
            }
            "unixromp" => {
                if !rest.starts_with('/') {
                    return Err(RompError::Config(format!(
                        "unix endpoint path must be absolute: {rest}"
                    )));
                }
                Ok(Endpoint::Unix {
                    path: PathBuf::from(rest),
                })
            }
            other => Err(RompError::Config(format!("unknown scheme: {other}"))),
        }
    }

    /// The host to connect to. Fails on wildcard (empty) hosts, which only
    /// make sense for listeners, and on Unix endpoints.
    pub fn connect_host(&self) -> Result<&str> {
        match self {
            Endpoint::Tcp { host, .. } | Endpoint::Udp { host, .. } => {
                host.as_deref().ok_or_else(|| {
                    RompError::Config("cannot connect to an endpoint without a host".to_string())
                })
            }
            Endpoint::Unix { .. } => Err(RompError::Config(
                "unix endpoints have no host".to_string(),
            )),
        }
    }
}

fn parse_host_port(rest: &str) -> Result<(Option<String>, u16)> {
    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| RompError::Config(format!("missing port: {rest}")))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| RompError::Config(format!("invalid port: {port}")))?;
    let host = if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    };
    Ok((host, port))
}

impl FromStr for Endpoint {
    type Err = RompError;

    fn from_str(uri: &str) -> Result<Self> {
        Endpoint::parse(uri)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => {
                write!(f, "tcpromp://{}:{port}", host.as_deref().unwrap_or(""))
            }
            Endpoint::Udp { host, port } => {
                write!(f, "udpromp://{}:{port}", host.as_deref().unwrap_or(""))
            }
            Endpoint::Unix { path } => write!(f, "unixromp://{}", path.display()),
        }
    }
}
