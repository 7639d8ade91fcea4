//! Dotted-decimal address text used throughout the data model.
//!
//! The peer carries addresses as raw 4- or 16-byte blocks. The model keeps
//! them as dotted decimal of every byte ("10.0.0.1", or sixteen
//! dot-separated octets for IPv6) so encode and decode stay symmetric.

use std::net::IpAddr;

pub const IPV4_ADDR_LEN: usize = 4;
pub const IPV6_ADDR_LEN: usize = 16;

/// Format raw octets as dotted decimal.
pub fn dotted(octets: &[u8]) -> String {
    octets
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Parse dotted-decimal text into octets.
///
/// Empty or malformed components become `0`, values above 255 keep their
/// low byte.
pub fn parse_dotted(text: &str) -> Vec<u8> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('.')
        .map(|part| part.trim().parse::<u32>().map(|v| (v & 0xFF) as u8).unwrap_or(0))
        .collect()
}

/// Octets of an IP address (4 or 16 bytes).
pub fn ip_octets(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// Normalise a textual address (standard IP notation or dotted octets) into
/// dotted decimal, reporting its octet count.
pub fn normalize(text: &str) -> Option<(String, usize)> {
    if let Ok(ip) = text.trim().parse::<IpAddr>() {
        let octets = ip_octets(&ip);
        return Some((dotted(&octets), octets.len()));
    }
    let octets = parse_dotted(text.trim());
    match octets.len() {
        IPV4_ADDR_LEN | IPV6_ADDR_LEN => Some((dotted(&octets), octets.len())),
        _ => None,
    }
}
