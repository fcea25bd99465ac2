//! # Repository Module
//!
//! Database repository implementations for Puesto POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SqliteDocumentStore / SqliteCache (puesto-inventory)                  │
//! │       │                                                                 │
//! │       │  db.documents().apply(&writes)                                 │
//! │       ▼                                                                 │
//! │  DocumentRepository                 CacheRepository                    │
//! │  ├── get(collection, id)            ├── get(key)                       │
//! │  ├── list(collection)               ├── set(key, value)                │
//! │  ├── insert(collection, body)       └── remove(keys)                   │
//! │  └── apply(writes)  (one tx)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite: documents, local_cache                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`DocumentRepository`](document::DocumentRepository) - JSON documents
//! - [`CacheRepository`](cache::CacheRepository) - Local key/value cache

pub mod cache;
pub mod document;
