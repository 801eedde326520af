//! # Task Master RAG
//!
//! A retrieval-augmented generation backend for a personal task manager.
//!
//! The client periodically pushes a full snapshot of its tasks and notes.
//! Each item is rendered into a text document, embedded, and stored in a
//! named collection that is rebuilt wholesale on every sync. Questions are
//! answered by retrieving the most similar documents, filling them into a
//! fixed prompt, and streaming the model's answer back as NDJSON.
//!
//! ## Architecture
//!
//! ```text
//! POST /train ──▶ mapper ──▶ index.replace_all ──▶ store (SQLite / memory)
//!                               │ embed
//!                               ▼
//!                           Embedder
//!
//! POST /chat ──▶ retriever ──▶ prompt ──▶ ChatModel.stream ──▶ {"token": ...}\n
//!                  │ embed query
//!                  ▼
//!              IndexStore snapshot
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`error`] | Request-facing error taxonomy |
//! | [`models`] | Core data types |
//! | [`mapper`] | Task/note → document rendering |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Persistent collection backends |
//! | [`index`] | Snapshot-swapping vector index |
//! | [`retriever`] | Top-k retrieval with stable ordering |
//! | [`prompt`] | Prompt template |
//! | [`generation`] | Generation model abstraction and adapters |
//! | [`backends`] | Lazily initialised process-wide handles |
//! | [`ingest`] | Sync controller |
//! | [`chat`] | Chat controller |
//! | [`quotes`] | Quote of the day |
//! | [`server`] | HTTP server |

pub mod backends;
pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod mapper;
pub mod models;
pub mod prompt;
pub mod quotes;
pub mod retriever;
pub mod server;
pub mod store;
