#![doc = include_str!("../README.md")]
#![deny(clippy::nursery, clippy::pedantic, missing_docs)]

pub mod archive;
pub mod interval;
pub mod model;
pub mod padding;
pub mod proto;
