//! Credential store — file-backed JSON document mapping team ids to
//! token records. Single-process, single-writer.

pub mod file;

pub use file::{CredentialRecord, CredentialStore};
