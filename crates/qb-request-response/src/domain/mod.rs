//! Domain layer: correlation ids, envelopes, outcomes, configuration, errors.

pub mod config;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod message;
pub mod outcome;

pub use config::*;
pub use correlation::*;
pub use envelope::*;
pub use error::*;
pub use message::*;
pub use outcome::*;
