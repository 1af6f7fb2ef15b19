//! Pipeline stages for one conversion call.
//!
//! ## Data Flow
//!
//! ```text
//! argv ──▶ args ──▶ form ──▶ (HTTP) ──▶ multipart ──▶ output
//!          (+input)  (upload)            (+disposition)
//! ```
//!
//! 1. [`args`]        — resolve the flat token vector into a request
//! 2. [`input`]       — existence checks and piped path lists
//! 3. [`form`]        — lay out and stream the `multipart/form-data` body
//! 4. [`multipart`]   — single-pass `multipart/mixed` decoder
//! 5. [`disposition`] — header parameter and RFC 5987 filename parsing

pub mod args;
pub mod disposition;
pub mod form;
pub mod input;
pub mod multipart;
