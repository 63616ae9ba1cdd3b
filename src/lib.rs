//! # repo-ask
//!
//! Client side of a "ask a question about a GitHub repo" tool. A search sends
//! a repository URL and a question to the backend, which answers with the
//! code snippets it found. Any line of those snippets can then carry its own
//! thread of follow-up questions, answered by a second endpoint.
//!
//! ## Flow
//!
//! ```text
//!     repo URL + question
//!             │
//!             ▼
//!   ┌───────────────────┐   POST /api/search    ┌─────────┐
//!   │   SearchSession   │ ────────────────────▶ │         │
//!   │ Idle/Loading/     │ ◀──────────────────── │         │
//!   │ Error/Ready       │     SearchResult      │         │
//!   └─────────┬─────────┘  (stale replies are   │ backend │
//!             │              dropped)           │         │
//!             ▼                                 │         │
//!   ┌───────────────────┐   POST /api/comment   │         │
//!   │  AnnotationStore  │ ────────────────────▶ │         │
//!   │ one dialog, per-  │ ◀──────────────────── │         │
//!   │ line QA threads   │   {"response": ...}   └─────────┘
//!   └───────────────────┘
//! ```
//!
//! A new search throws away the previous result and every thread on it.
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for the backend URL and timeouts
//! - [`models`] - Wire types: `SearchResult`, `Snippet`, line ranges, request bodies
//! - [`client`] - `Backend` trait and its `reqwest` implementation
//! - [`session`] - Search lifecycle state machine with the stale-response guard
//! - [`annotations`] - Per-line QA threads and the single question dialog
//! - [`render`] - File/block/row layout of a result and its text form
//! - [`state`] - Session-lifetime state tying the above to the backend

pub mod annotations;
pub mod client;
pub mod config;
pub mod models;
pub mod render;
pub mod session;
pub mod state;
