//! A minimal content-addressed object store and smart-HTTP fetch client,
//! compatible on-disk and on-the-wire with a widely deployed distributed
//! version control system.
//!
//! The crate is organized bottom-up: [`hash`] and [`compress`] are leaf
//! codecs, [`fs`] is the only filesystem surface the rest of the crate
//! touches, [`store`] and [`repository`] persist objects and the repository
//! layout, [`packfile`] decodes a transported pack stream into the store,
//! [`wire`] frames and demultiplexes the smart-HTTP protocol, [`transport`]
//! speaks HTTP, and [`clone`] wires all of the above into the end-to-end
//! clone pipeline that the `microgit` binary exposes as a CLI.

pub mod clone;
pub mod compress;
pub mod error;
pub mod fs;
pub mod hash;
pub mod packfile;
pub mod repository;
pub mod store;
pub mod transport;
pub mod wire;

pub use error::{Error, Result};
pub use hash::Hash;
pub use repository::Repository;
pub use store::{ObjectStore, ObjectType};
