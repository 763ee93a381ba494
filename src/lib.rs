//! uservars: a session-lifetime, binary-safe key/value store for user
//! variables, set/read/deleted by a host through three entry points.
//!
//! Internal Design:
//!
//! Layers
//! - ByteHashMap<V, S>: structural map keyed by owned byte buffers. An
//!   injected `KeyHasher` supplies the hash function and the equality
//!   predicate; the default hashes the whole slice and compares length,
//!   then bytes. Entries live in a generational slot map and an index table
//!   maps stored hashes to slots, so growth never re-runs the hasher.
//! - UserVarStore<S>: ownership discipline on top of the map. Every key and
//!   value is a private copy; overwrite builds the new value buffer before
//!   releasing the old; reads return copies. The map is allocated lazily on
//!   the first `set`.
//! - session: one store per execution context plus the `setvar`/`getvar`/
//!   `delvar` entry points, where `None` stands for an absent argument.
//!
//! Constraints
//! - Single-threaded: the map is `!Send`/`!Sync`; no locking anywhere.
//! - Binary-safe: embedded zero bytes are ordinary content and empty keys
//!   and values are valid.
//! - Allocation failure is reported as `UserVarError::OutOfMemory` and
//!   never leaves a half-built entry in the map.
//!
//! Missing keys on delete
//! - Decided per store by `MissingKeyPolicy`. The default, `Ignore`,
//!   answers `false`; `Error` answers `UserVarError::KeyNotFound`.

pub mod byte_hash_map;
pub mod config;
pub mod error;
mod byte_hash_map_proptest;
pub mod session;
pub mod shell;
pub mod store;

// Public surface
pub use byte_hash_map::{bytes_eq, ByteHashMap, Handle, InsertError, KeyHasher};
pub use config::{MissingKeyPolicy, StoreConfig};
pub use error::{Result, UserVarError};
pub use store::UserVarStore;

/// Current version of uservars
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
