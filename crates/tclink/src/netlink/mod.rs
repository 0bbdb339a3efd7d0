//! Netlink protocol layer: framing, attributes, fixed records, and the
//! async route socket the traffic-control operations run over.

pub mod attr;
pub mod builder;
pub mod connection;
pub mod error;
pub mod message;
pub mod record;
pub mod socket;

pub use connection::Connection;
pub use error::{Error, ErrorList, Result};
pub use record::Endian;
