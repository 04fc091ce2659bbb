//! Cross-crate integration tests over the in-memory shared bus.

pub mod fixtures;
mod flows;
mod races;
