//! Adapters - concrete implementations of ports (traits)

mod chain;
mod material;
pub(crate) mod soft_crypto;
mod soft_store;

#[cfg(test)]
pub(crate) mod fake_store;
#[cfg(test)]
pub(crate) mod fixtures;

pub use soft_store::SoftStore;
