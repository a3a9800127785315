//! # Marginalia Architecture
//!
//! Marginalia keeps **threaded comments anchored to ranges of a live document**.
//! It is an editor-agnostic library: the host supplies a [`indicator::Document`]
//! over its own marker API and a [`gateway::Gateway`] over its own storage, and
//! drives everything through one facade.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Sync Controller (controller.rs)                            │
//! │  - The only entry point for a presentation layer            │
//! │  - Owns "active document" and "expanded thread"             │
//! │  - Every mutation: store → save → re-render                 │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                            │
//!                 ▼                            ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │  Thread Store (store/)        │ │  Indicator Engine         │
//! │  - Threads per target         │ │  (indicator/)             │
//! │  - Id counter, sort orders    │ │  - ThreadId → Marker      │
//! │  - Load/save via Gateway      │ │  - Highlight, clear       │
//! │                               │ │  - Hit-testing            │
//! └───────────────────────────────┘ └───────────────────────────┘
//!                 │                            │
//!                 ▼                            ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │  Gateway (gateway/)           │ │  Document trait           │
//! │  - FsGateway, MemGateway      │ │  - MemDocument (testing)  │
//! └───────────────────────────────┘ └───────────────────────────┘
//! ```
//!
//! ## Event Loop Model
//!
//! Everything runs on the host's single UI loop; nothing here spawns threads
//! or locks. The one slow boundary is the gateway. A host that cannot block
//! calls [`store::fetch_comments`] wherever it likes and hands the result to
//! [`store::CommentStore::apply_loaded`] on the loop, which swaps the table in
//! one step.
//!
//! ## Logging
//!
//! All logging goes through the [`log`] facade with `marginalia::<module>`
//! targets. The crate never installs a logger.
//!
//! ## Module Overview
//!
//! - [`controller`]: The facade for presentation layers
//! - [`store`]: Thread table, sort orders, wire format
//! - [`indicator`]: Marker projection and hit-testing
//! - [`gateway`]: Persistence request abstraction and implementations
//! - [`model`]: Core data types (`Thread`, `Comment`, `Person`)
//! - [`position`]: Positions, ranges and the `Indicator` anchor union
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod indicator;
pub mod model;
pub mod position;
pub mod store;

#[cfg(test)]
pub(crate) mod test_utils;
