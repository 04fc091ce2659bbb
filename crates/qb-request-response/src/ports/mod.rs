//! Ports layer: the API this crate offers and the collaborators it needs.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
