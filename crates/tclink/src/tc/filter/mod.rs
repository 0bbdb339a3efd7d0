//! Filter option schemas.

pub mod u32;

pub use self::u32::{U32, U32Key, U32Mark, U32Sel};
