//! Flat file store with optional AES-GCM encryption at rest.
//!
//! Every uploaded file is one object in the storage directory. With
//! encryption enabled the object is `{storage_dir}/{name}.enc` holding
//! `nonce || ciphertext || tag`; without it the object is `{storage_dir}/{name}`
//! holding the raw bytes.

pub mod crypto;
pub mod gateway;
pub mod key;
pub mod naming;
pub mod routes;
