//! Conversation view-model engine for streaming agent chat transcripts.
//!
//! The core lives in [`viewmodel`]: it ingests a flat, chronologically
//! ordered message sequence and derives display state — same-kind message
//! groups, materialized content blocks, tool-invocation projections, text
//! overflow pagination, and a working indicator that stays correct as tool
//! results resolve asynchronously. [`render`] and [`app`] are the shipped
//! terminal collaborators on top of that state; [`source`] and [`sample`]
//! feed it.

pub mod app;
pub mod model;
pub mod render;
pub mod sample;
pub mod source;
pub mod viewmodel;
