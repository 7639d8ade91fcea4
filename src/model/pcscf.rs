//! P-CSCF address lists and acquisition methods.

use crate::codec::{WireReader, WireWriter};
use crate::error::Result;

use super::address::{dotted, normalize, parse_dotted, IPV4_ADDR_LEN, IPV6_ADDR_LEN};

/// Maximum addresses per family.
pub const MAX_PCSCF: usize = 10;

/// Encoded size of a P-CSCF list.
pub const PCSCF_LIST_SIZE: usize =
    4 + MAX_PCSCF * (4 + IPV4_ADDR_LEN) + 4 + MAX_PCSCF * (4 + IPV6_ADDR_LEN);

/// How the peer wants the P-CSCF to be discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AcquireMethod {
    #[default]
    None = 0,
    Sim = 1,
    Mo = 2,
    Pco = 3,
    DhcpV4 = 4,
    DhcpV6 = 5,
    Manual = 6,
}

impl TryFrom<u8> for AcquireMethod {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Sim),
            2 => Ok(Self::Mo),
            3 => Ok(Self::Pco),
            4 => Ok(Self::DhcpV4),
            5 => Ok(Self::DhcpV6),
            6 => Ok(Self::Manual),
            other => Err(other),
        }
    }
}

/// A single P-CSCF endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcscfAddr {
    pub protocol: u8,
    pub port: u16,
    /// Dotted decimal of the 4 or 16 address bytes.
    pub address: String,
}

impl PcscfAddr {
    fn decode(r: &mut WireReader<'_>, addr_len: usize) -> Result<Self> {
        let protocol = r.decode_u8()?;
        r.skip(1)?;
        let port = r.decode_u16()?;
        let address = dotted(r.decode_bytes(addr_len)?);
        Ok(Self {
            protocol,
            port,
            address,
        })
    }

    fn encode(&self, w: &mut WireWriter, addr_len: usize) {
        w.encode_u8(self.protocol);
        w.pad(1);
        w.encode_u16(self.port);

        let mut raw = parse_dotted(&self.address);
        raw.resize(addr_len, 0);
        w.encode_bytes(&raw);
    }
}

/// Discovered P-CSCF endpoints, split by address family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcscfInfo {
    pub source: AcquireMethod,
    pub v4_addrs: Vec<PcscfAddr>,
    pub v6_addrs: Vec<PcscfAddr>,
}

impl PcscfInfo {
    pub fn new(source: AcquireMethod) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    /// Build from a list of addresses with no port, as provisioned on the ISIM.
    pub fn from_addresses<S: AsRef<str>>(source: AcquireMethod, addresses: &[S]) -> Self {
        let mut info = Self::new(source);
        for address in addresses {
            info.add(address.as_ref(), 0);
        }
        info
    }

    /// Add an endpoint. The family is chosen by address length.
    ///
    /// Returns `false` if the address is not a 4- or 16-byte address or the
    /// family's list is already full.
    pub fn add(&mut self, address: &str, port: u16) -> bool {
        let Some((address, len)) = normalize(address) else {
            tracing::warn!(address, "Ignoring unparsable P-CSCF address");
            return false;
        };
        let list = if len == IPV4_ADDR_LEN {
            &mut self.v4_addrs
        } else {
            &mut self.v6_addrs
        };
        if list.len() >= MAX_PCSCF {
            return false;
        }
        list.push(PcscfAddr {
            protocol: 0,
            port,
            address,
        });
        true
    }

    /// Total number of endpoints across both families.
    pub fn address_count(&self) -> usize {
        self.v4_addrs.len() + self.v6_addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.address_count() == 0
    }

    /// Decode a P-CSCF list. Only the first `count` entries of each family
    /// are kept; the source is not on the wire and stays `None`.
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self> {
        let v4_addrs = decode_family(r, IPV4_ADDR_LEN)?;
        let v6_addrs = decode_family(r, IPV6_ADDR_LEN)?;
        Ok(Self {
            source: AcquireMethod::None,
            v4_addrs,
            v6_addrs,
        })
    }

    pub fn encode(&self, w: &mut WireWriter) {
        encode_family(w, &self.v4_addrs, IPV4_ADDR_LEN);
        encode_family(w, &self.v6_addrs, IPV6_ADDR_LEN);
    }
}

fn decode_family(r: &mut WireReader<'_>, addr_len: usize) -> Result<Vec<PcscfAddr>> {
    let count = r.decode_u8()? as usize;
    r.skip(3)?;
    let mut addrs = Vec::with_capacity(count.min(MAX_PCSCF));
    for i in 0..MAX_PCSCF {
        let addr = PcscfAddr::decode(r, addr_len)?;
        if i < count {
            addrs.push(addr);
        }
    }
    Ok(addrs)
}

fn encode_family(w: &mut WireWriter, addrs: &[PcscfAddr], addr_len: usize) {
    let addrs = &addrs[..addrs.len().min(MAX_PCSCF)];
    w.encode_u8(addrs.len() as u8);
    w.pad(3);
    let unused = PcscfAddr::default();
    for i in 0..MAX_PCSCF {
        addrs.get(i).unwrap_or(&unused).encode(w, addr_len);
    }
}
