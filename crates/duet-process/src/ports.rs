//! Free port discovery.

use duet_common::{LaunchError, LaunchResult};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use tracing::debug;

/// Find the first bindable TCP port in `preferred..preferred + range_size`.
///
/// Each candidate is tested by binding a listener on `127.0.0.1` and dropping
/// it straight away, so the port is free again for the real service by the
/// time this returns. The loopback address is used explicitly; a name such as
/// `localhost` could resolve to either address family.
///
/// Ranges that would run past 65535 are truncated. An empty range, or one in
/// which every port is taken, yields [`LaunchError::PortExhausted`].
///
/// # Examples
///
/// ```rust,no_run
/// use duet_process::find_free_port;
///
/// let port = find_free_port(11434, 10).unwrap();
/// assert!((11434..11444).contains(&port));
/// ```
pub fn find_free_port(preferred: u16, range_size: u16) -> LaunchResult<u16> {
    let last = preferred.saturating_add(range_size.saturating_sub(1));

    if range_size == 0 {
        return Err(LaunchError::PortExhausted {
            first: preferred,
            last: preferred,
        });
    }

    for port in preferred..=last {
        if port_is_free(port) {
            if port != preferred {
                debug!("Port {} busy, using {} instead", preferred, port);
            }
            return Ok(port);
        }
        debug!("Port {} is in use", port);
    }

    Err(LaunchError::PortExhausted {
        first: preferred,
        last,
    })
}

/// Whether a listener can currently be bound to `127.0.0.1:port`.
pub fn port_is_free(port: u16) -> bool {
    TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)).is_ok()
}
