#![doc = include_str!("../README.md")]
#![deny(clippy::nursery, clippy::pedantic, missing_docs)]

pub mod error;
pub mod index;
pub mod lock;
pub mod memory;
pub mod repository;
pub mod settings;
pub mod signer;
pub mod store;
pub mod worker;
