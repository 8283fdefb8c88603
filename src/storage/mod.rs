//!  Storage is organized through [kv::KeyValueStore] and the [kv::JsonStore] adapter on top.
//!  The basic idea is:
//!   - Every piece of state lives under a string key, see [keys].
//!   - Values are JSON documents. Decoding happens per entity in [entities], so a malformed
//!     value only ever costs the caller a default.
//!   - [file_store::FileStore] keeps one file per key and is shared between the cli and the
//!     daemon, [memory_store::MemoryStore] is used in tests.

pub mod entities;
pub mod file_store;
pub mod keys;
pub mod kv;
pub mod memory_store;
