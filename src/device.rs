//! Network device view
//!
//! Only the receive MSS of a device matters here.

/// IPv4 header length without options
pub const IPV4_HDRLEN: u16 = 20;
/// IPv6 fixed header length
pub const IPV6_HDRLEN: u16 = 40;
/// TCP header length without options
pub const TCP_HDRLEN: u16 = 20;
/// Ethernet link-layer header length
pub const ETH_HDRLEN: u16 = 14;

/// Handle of a registered device
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevId(pub u8);

/// Network device as seen by the TCP layer
pub trait NetDevice {
    /// Largest TCP payload the device can receive in one packet
    fn rx_mss(&self) -> u16;
}

impl<D: NetDevice + ?Sized> NetDevice for &D {
    fn rx_mss(&self) -> u16 {
        (**self).rx_mss()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IpDomain {
    Ipv4,
    Ipv6,
}

impl IpDomain {
    pub fn hdrlen(self) -> u16 {
        match self {
            IpDomain::Ipv4 => IPV4_HDRLEN,
            IpDomain::Ipv6 => IPV6_HDRLEN,
        }
    }
}

/// Device described by its packet size and link-layer header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceMtu {
    pub pktsize: u16,      // Largest packet including the link-layer header
    pub llhdrlen: u16,     // Link-layer header bytes
    pub domain: IpDomain,
}

impl DeviceMtu {
    /// Ethernet device with a 1500 byte MTU
    pub fn ethernet(domain: IpDomain) -> Self {
        Self {
            pktsize: 1500 + ETH_HDRLEN,
            llhdrlen: ETH_HDRLEN,
            domain,
        }
    }
}

impl NetDevice for DeviceMtu {
    fn rx_mss(&self) -> u16 {
        self.pktsize
            .saturating_sub(self.llhdrlen)
            .saturating_sub(self.domain.hdrlen())
            .saturating_sub(TCP_HDRLEN)
    }
}
