//! Sled-backed persistence for the ledger: blocks through
//! [`ledger_core::ChainStore`], pending transactions through
//! [`SledStore::save_pending`] / [`SledStore::load_pending`].

pub mod sled_store;

pub use sled_store::SledStore;
