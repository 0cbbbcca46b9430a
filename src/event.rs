//! Event envelope construction.
//!
//! Each builder maps a tracking intent onto the canonical `{"type": ..., ...}`
//! payload. Actions are open strings: the ingestion service, not this client,
//! decides which ones are valid.

use crate::types::{BatchEnvelope, Envelope, EventData};

pub const PAGEVIEW: &str = "pageview";
pub const ORDER: &str = "order";

const PRODUCT_PREFIX: &str = "product_";
const CART_PREFIX: &str = "cart_";
const USER_PREFIX: &str = "user_";

/// Build an envelope of the given kind.
///
/// A `type` key inside `data` is discarded so the envelope's type always
/// reflects `kind`.
pub fn build_event(kind: impl Into<String>, data: impl Into<EventData>) -> Envelope {
    Envelope::new(kind, data.into())
}

pub fn build_page_view(data: impl Into<EventData>) -> Envelope {
    build_event(PAGEVIEW, data)
}

/// `product_<action>`, e.g. `product_view`
pub fn build_product_event(action: &str, data: impl Into<EventData>) -> Envelope {
    build_event(format!("{}{}", PRODUCT_PREFIX, action), data)
}

/// `cart_<action>`, e.g. `cart_add`
pub fn build_cart_event(action: &str, data: impl Into<EventData>) -> Envelope {
    build_event(format!("{}{}", CART_PREFIX, action), data)
}

pub fn build_order_event(data: impl Into<EventData>) -> Envelope {
    build_event(ORDER, data)
}

/// `user_<action>`, e.g. `user_login`
pub fn build_user_event(action: &str, data: impl Into<EventData>) -> Envelope {
    build_event(format!("{}{}", USER_PREFIX, action), data)
}

pub fn build_custom_event(kind: impl Into<String>, data: impl Into<EventData>) -> Envelope {
    build_event(kind, data)
}

/// Wrap envelopes for a single batch submission. Order and count are kept as given.
pub fn build_batch(events: Vec<Envelope>) -> BatchEnvelope {
    BatchEnvelope { events }
}
