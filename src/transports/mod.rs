//! Concrete transports

pub mod udp;

pub use udp::UdpTransport;
