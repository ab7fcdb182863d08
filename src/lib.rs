//! dmbridge — a bidirectional adapter between a chat platform's push
//! gateway and a turn-based dialog engine.
//!
//! The gateway delivers user actions (messages, edits, deletes, reactions,
//! typing, button clicks) asynchronously and in any order; the dialog
//! engine consumes one activity per turn and answers with zero or more
//! activities. The adapter keeps per-user conversation identity across that
//! stateless stream, correlates late events back to earlier messages
//! through bounded caches, and isolates turn failures so one user's error
//! cannot destabilize the shared connection.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod activity;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod ingest;
pub mod logging;
pub mod registry;

mod outbound;
