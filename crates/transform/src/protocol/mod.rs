//! Wire types for the two protocols this crate translates between.
//!
//! `anthropic` models the north-side Messages API (what clients send and
//! receive); `responses` models the south-side OpenAI Responses API (what
//! the upstream provider sends and receives). Both modules favor permissive
//! decoding: unknown shapes fall back to a text rendering rather than a
//! deserialize error, matching the duck-typed tolerance of the system this
//! was translated from.

pub mod anthropic;
pub mod responses;
