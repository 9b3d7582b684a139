//! Course recommendation backend — semantic search over a course catalog.
//!
//! Every course in a CSV catalog is embedded once, offline, into a vector. The
//! vectors are L2-normalized and stored in an exact inner-product index that is
//! persisted to disk. At query time the service embeds the query, normalizes it
//! the same way, and returns the most similar courses.
//!
//! ```text
//! dataset.csv ──▶ Catalog ──▶ build_index ──▶ index.cfx (+ embeddings.npy)
//!                                                  │
//! query ──▶ EmbeddingProvider ──▶ l2_normalize ──▶ SimilarityIndex::search ──▶ CourseRecord[]
//! ```
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`error`] — [`RetrievalError`](error::RetrievalError), the typed error surfaced to callers
//! - [`catalog`] — Course records and CSV catalog loading
//! - [`embedding`] — Text-to-vector providers (OpenAI-compatible API, offline hashing)
//! - [`index`] — Normalized inner-product index, its builder and on-disk formats
//! - [`recommend`] — [`RetrievalService`](recommend::RetrievalService), the query engine
//! - [`server`] — axum HTTP API over the query engine

pub mod catalog;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod recommend;
pub mod server;
