//! Built-in request handlers served by the runtime.

mod echo;

pub use echo::{Echo, EchoHandler, EchoReply, ECHO_TOPIC};
