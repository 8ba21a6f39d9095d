//! Core data models for the Open Graph preview service.
//!
//! A preview maps onto the `previews` table via `sqlx::FromRow` and
//! serializes as JSON via `serde` for both the API and the event stream.

pub mod preview;
