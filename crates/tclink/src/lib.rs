//! Async traffic-control configuration for Linux.
//!
//! This crate speaks the rtnetlink traffic-control protocol to manage
//! queueing disciplines, traffic classes and filters programmatically,
//! without shelling out to `tc(8)`. Discipline options are typed
//! schemas; kinds without one are carried verbatim so dumps can be
//! re-encoded without loss.
//!
//! # Example
//!
//! ```ignore
//! use tclink::netlink::Connection;
//! use tclink::tc::qdisc::netem::{Netem, NetemQopt};
//! use tclink::tc::{Qdisc, TcMsg, TcObject, TcOptions, handle};
//!
//! #[tokio::main]
//! async fn main() -> tclink::Result<()> {
//!     let conn = Connection::new()?;
//!     let qdisc = Qdisc::new(&conn);
//!
//!     // Add 100ms of delay on interface 2.
//!     let msg = TcMsg::new()
//!         .with_ifindex(2)
//!         .with_handle(handle::build_handle(1, 0))
//!         .with_parent(handle::HANDLE_ROOT);
//!     let netem = Netem {
//!         qopt: NetemQopt {
//!             latency: 100_000,
//!             limit: 1000,
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!     qdisc.add(&TcObject::new(msg, TcOptions::Netem(netem))).await?;
//!
//!     // List everything back.
//!     for object in qdisc.get().await?.into_result()? {
//!         println!("{}: {}", object.msg.ifindex, object.attribute.options.kind());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod netlink;
pub mod tc;

// Re-export common types at crate root for convenience
pub use netlink::{Connection, Endian, Error, ErrorList, Result};
pub use tc::{Class, Filter, Qdisc, TcDump, TcMsg, TcObject, TcOptions};
