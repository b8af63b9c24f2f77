//! Protocol-translating core for the Anthropic Messages ↔ OpenAI Responses
//! bridge.
//!
//! This crate is the pure, non-async heart of the proxy (C1–C6 in the design
//! document): it never performs I/O, never suspends, and owns no shared
//! mutable state. Every public entry point is a plain function or a small
//! owned state machine ([`stream::StreamTransformer`]) driven one event at a
//! time by a caller that does the actual networking.
//!
//! - [`request`] — C2: Anthropic request JSON → Responses request JSON.
//! - [`response`] — C3: Responses object → Anthropic message object, plus
//!   the multi-mode CLI conversion entry point.
//! - [`item`] — C5: the shared Responses-items → Anthropic-messages rules
//!   used by both C3 and C4's terminal fan-out.
//! - [`stream`] — C4: the Responses→Anthropic streaming state machine.
//! - [`sse`] — C1: SSE line framing in both directions.
//! - [`model_map`] — C6: pattern-to-replacement model resolution.
//! - [`scrub`] — the log payload scrubber.
//! - [`deep_merge`] — the recursive merge helper shared by C2's reasoning
//!   override and C6's extras merge.
//! - [`protocol`] — the wire types for both sides.
//! - [`error`] — the shared error taxonomy.

pub mod deep_merge;
pub mod error;
pub mod item;
pub mod model_map;
pub mod protocol;
pub mod request;
pub mod response;
pub mod scrub;
pub mod sse;
pub mod stream;

pub use error::{Result, TransformError};
