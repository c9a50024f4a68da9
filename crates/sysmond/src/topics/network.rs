//! IPv4 interface addresses.

use std::net::SocketAddrV4;

use nix::ifaddrs::getifaddrs;
use nix::sys::socket::SockaddrStorage;
use serde::Serialize;

use sysmon_protocol::HandlerError;

/// Placeholder reported for addresses without a netmask.
const ABSENT: &str = "absent";

/// One IPv4 address bound to an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceAddress {
    /// Interface name, for example `eth0`.
    pub interface: String,
    /// Dotted-quad address.
    pub address: String,
    /// Dotted-quad netmask, or `absent`.
    pub netmask: String,
}

/// Every IPv4 address on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSnapshot {
    /// Addresses in interface enumeration order.
    pub interfaces: Vec<InterfaceAddress>,
}

impl InterfaceAddress {
    fn new(interface: &str, address: SocketAddrV4, netmask: Option<SocketAddrV4>) -> Self {
        Self {
            interface: interface.to_owned(),
            address: address.ip().to_string(),
            netmask: netmask.map_or_else(|| ABSENT.to_owned(), |mask| mask.ip().to_string()),
        }
    }
}

pub(super) fn collect() -> Result<NetworkSnapshot, HandlerError> {
    let addresses = getifaddrs().map_err(|errno| HandlerError::from_error(&errno))?;
    let interfaces = addresses
        .filter_map(|entry| {
            let address = ipv4(entry.address.as_ref())?;
            let netmask = ipv4(entry.netmask.as_ref());
            Some(InterfaceAddress::new(&entry.interface_name, address, netmask))
        })
        .collect();
    Ok(NetworkSnapshot { interfaces })
}

fn ipv4(storage: Option<&SockaddrStorage>) -> Option<SocketAddrV4> {
    storage
        .and_then(SockaddrStorage::as_sockaddr_in)
        .map(|sin| SocketAddrV4::from(*sin))
}
