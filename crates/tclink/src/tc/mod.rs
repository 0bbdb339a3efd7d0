//! Traffic-control message schemas and operations.

pub mod action;
pub mod filter;
pub mod handle;
pub mod msg;
pub mod object;
pub mod ops;
pub mod police;
pub mod qdisc;

pub use action::{Action, ActionKind, TcGact, TcMirred};
pub use msg::TcMsg;
pub use object::{TcAttribute, TcObject, TcOptions, TcStats, TcStats2};
pub use ops::{Class, Filter, Qdisc, TcDump};
pub use police::Police;
