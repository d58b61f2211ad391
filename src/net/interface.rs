//! Network interface discovery for the multicast join

use std::net::Ipv6Addr;

use crate::error::PtpClientError;

/// Interface the PTP sockets join the multicast group on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// Interface name (e.g. `eth0`)
    pub name: String,
    /// Interface index, as used by the IPv6 multicast join
    pub index: u32,
    /// An IPv6 address assigned to the interface
    pub address: Ipv6Addr,
}

/// Find the interface to run PTP on
///
/// With `requested`, the interface of that name is used as long as it has
/// an IPv6 address. Otherwise the first interface that is up, is not a
/// loopback and has an IPv6 address wins.
///
/// # Errors
///
/// Returns `PtpClientError::NoInterface` if nothing matches, or
/// `PtpClientError::InterfaceQuery` if the interfaces cannot be listed.
#[cfg(unix)]
pub fn discover_interface(requested: Option<&str>) -> Result<InterfaceInfo, PtpClientError> {
    use nix::ifaddrs::getifaddrs;
    use nix::net::if_::{InterfaceFlags, if_nametoindex};

    let addrs = getifaddrs().map_err(|e| PtpClientError::InterfaceQuery {
        message: e.to_string(),
    })?;

    for ifaddr in addrs {
        match requested {
            Some(name) if ifaddr.interface_name != name => continue,
            Some(_) => {}
            None => {
                if ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK)
                    || !ifaddr.flags.contains(InterfaceFlags::IFF_UP)
                {
                    continue;
                }
            }
        }
        let Some(address) = ifaddr
            .address
            .as_ref()
            .and_then(|addr| addr.as_sockaddr_in6())
            .map(nix::sys::socket::SockaddrIn6::ip)
        else {
            continue;
        };
        let index = if_nametoindex(ifaddr.interface_name.as_str()).map_err(|e| {
            PtpClientError::InterfaceQuery {
                message: format!("{}: {e}", ifaddr.interface_name),
            }
        })?;
        tracing::debug!(
            interface = %ifaddr.interface_name,
            index,
            %address,
            "PTP client: selected interface"
        );
        return Ok(InterfaceInfo {
            name: ifaddr.interface_name,
            index,
            address,
        });
    }

    Err(PtpClientError::NoInterface {
        requested: requested.map(str::to_owned),
    })
}

/// Find the interface to run PTP on
///
/// # Errors
///
/// Interface discovery is only available on unix platforms; this always
/// returns `PtpClientError::NoInterface`. Use a unicast configuration.
#[cfg(not(unix))]
pub fn discover_interface(requested: Option<&str>) -> Result<InterfaceInfo, PtpClientError> {
    Err(PtpClientError::NoInterface {
        requested: requested.map(str::to_owned),
    })
}
