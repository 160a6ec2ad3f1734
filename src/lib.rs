//! # RAG Relay
//!
//! Command-line front end for budget-aware scatter-gather question
//! answering. The planning, rendering, and coordination logic lives in
//! [`rag_relay_core`]; this crate supplies configuration, item sources,
//! HTTP responders, progress output, and the `relay` binary.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────────┐
//! │ Item sources │──▶│ rag_relay_core│──▶│    Responder     │
//! │ manifest/FS  │   │ plan + render │   │ OpenAI/Anthropic │
//! └──────────────┘   └───────┬───────┘   └──────────────────┘
//!                            │
//!                            ▼
//!                     ┌────────────┐
//!                     │    CLI     │
//!                     │  (relay)   │
//!                     └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`manifest`] | JSON item manifests |
//! | [`connector_fs`] | Filesystem item source |
//! | [`sources`] | Source health and item collection |
//! | [`responder`] | HTTP responders and provider factory |
//! | [`progress`] | Stderr progress reporters |
//! | [`plan_cmd`] | `profiles`, `plan`, and `render` commands |
//! | [`ask`] | `ask` command and JSON export |

pub mod ask;
pub mod config;
pub mod connector_fs;
pub mod manifest;
pub mod plan_cmd;
pub mod progress;
pub mod responder;
pub mod sources;
