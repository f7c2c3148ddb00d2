//! Hardware sensor bridge.
//!
//! Reads newline-delimited JSON sensor frames from a raw byte channel,
//! classifies each field into one of seven canonical metrics, and serves the
//! latest consistent snapshot over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Input source │──>│ Frame reader │──>│   Parser +   │──>│   Snapshot   │
//! │ stdin / tcp  │   │ (rate limit) │   │  classifier  │   │    writer    │
//! │ path/serial  │   └──────────────┘   └──────────────┘   └──────┬───────┘
//! └──────────────┘                                                │ Arc swap
//!                    ┌──────────────┐   ┌──────────────┐   ┌──────▼───────┐
//!                    │  HTTP client │<──│ HTTP server  │<──│   Snapshot   │
//!                    │              │   │ /data /raw.. │   │    reader    │
//!                    └──────────────┘   └──────┬───────┘   └──────────────┘
//!                                              │ POST /reset
//!                                              └──> command queue ──> ingestion
//! ```
//!
//! # Usage
//!
//! ```bash
//! suika-bridge --config suika.json5
//! producer | suika-bridge --input stdin
//! suika-bridge --input serial --config serial.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::BridgeConfig`] for configuration options.

pub mod classifier;
pub mod commands;
pub mod config;
pub mod frame;
pub mod http;
pub mod ingest;
pub mod parser;
pub mod payload;
pub mod snapshot;
pub mod staleness;

pub use commands::{BridgeCommand, command_channel};
pub use config::BridgeConfig;
pub use http::{AppState, HttpServer, create_router};
pub use ingest::Ingestor;
pub use parser::ParseError;
pub use snapshot::{BridgeState, SnapshotReader, SnapshotWriter, exchange};
