//! Storage backends for the snip URL shortener.
//!
//! Every backend implements [`ReadRepository`] and [`Repository`] from
//! `snip-core`; [`Backend`] picks one at runtime.

pub mod backend;
pub mod file;
mod index;
pub mod memory;
pub mod mysql;

pub use backend::Backend;
pub use file::{FileRepository, FileSettings};
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;

pub use snip_core::{
    AddOutcome, DeleteOutcome, DeleteRequest, ReadRepository, Repository, Result, ShortCode, Stats,
    StorageError, UrlRecord,
};
