//! Typed request messages.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A request type with a known response type.
///
/// Type tags default to the Rust type names. Override them when requests
/// cross process boundaries and names must stay stable.
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct GetOrder { id: u64 }
///
/// impl RequestMessage for GetOrder {
///     type Response = Order;
///     fn request_type() -> &'static str { "orders.GetOrder" }
///     fn response_type() -> &'static str { "orders.Order" }
/// }
/// ```
pub trait RequestMessage: Serialize + Send + Sync {
    type Response: DeserializeOwned + Send;

    fn request_type() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn response_type() -> &'static str {
        std::any::type_name::<Self::Response>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize)]
    struct Ping;

    #[derive(Deserialize)]
    struct Pong;

    impl RequestMessage for Ping {
        type Response = Pong;
    }

    #[derive(Serialize)]
    struct Tagged;

    impl RequestMessage for Tagged {
        type Response = Pong;

        fn request_type() -> &'static str {
            "test.Tagged"
        }
    }

    #[test]
    fn test_default_tags_are_type_names() {
        assert!(Ping::request_type().ends_with("Ping"));
        assert!(Ping::response_type().ends_with("Pong"));
    }

    #[test]
    fn test_overridden_tag() {
        assert_eq!(Tagged::request_type(), "test.Tagged");
        assert!(Tagged::response_type().ends_with("Pong"));
    }
}
