//! Qdisc option schemas.

pub mod cbq;
pub mod codel;
pub mod fq_codel;
pub mod hhf;
pub mod netem;
pub mod pie;
pub mod red;
pub mod sfb;

pub use cbq::Cbq;
pub use codel::Codel;
pub use fq_codel::FqCodel;
pub use hhf::Hhf;
pub use netem::Netem;
pub use pie::Pie;
pub use red::Red;
pub use sfb::Sfb;
