use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// HTTP method accepted by the ingestion API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters for the read-back endpoints
pub type Params = Map<String, Value>;

/// Open record of event fields forwarded to the server as-is.
///
/// Absent values are never stored: use [`EventData::insert_opt`] for optional
/// fields so that `None` leaves the key out instead of sending `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventData(Map<String, Value>);

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert_opt<V: Into<Value>>(
        &mut self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.0.insert(key.into(), value.into());
        }
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_opt<V: Into<Value>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.insert_opt(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Parse a JSON object supplied on the command line
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::try_from(value)
    }
}

impl From<Map<String, Value>> for EventData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for EventData {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::InvalidData(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Canonical event payload: `{"type": kind, ...fields}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    fields: EventData,
}

impl Envelope {
    /// A `type` key inside `fields` is discarded so the serialized type is
    /// always `kind`.
    pub fn new(kind: impl Into<String>, mut fields: EventData) -> Self {
        fields.remove("type");
        Self {
            kind: kind.into(),
            fields,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &EventData {
        &self.fields
    }
}

/// Batch submission body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEnvelope {
    pub events: Vec<Envelope>,
}

impl BatchEnvelope {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Fields of a `pageview` event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageView {
    pub url: String,
    pub title: Option<String>,
    pub referrer: Option<String>,
}

/// Fields of a `product_<action>` event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductData {
    pub product_id: String,
    pub name: Option<String>,
    pub price: Option<f64>,
}

/// Fields of a `cart_<action>` event. `items` is forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartData {
    pub total: Option<f64>,
    pub items: Option<Value>,
}

/// Fields of an `order` event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderData {
    pub order_id: String,
    pub total: Option<f64>,
    pub items: Option<Value>,
}

/// Fields of a `user_<action>` event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserData {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<PageView> for EventData {
    fn from(data: PageView) -> Self {
        EventData::new()
            .with("url", data.url)
            .with_opt("title", data.title)
            .with_opt("referrer", data.referrer)
    }
}

impl From<ProductData> for EventData {
    fn from(data: ProductData) -> Self {
        EventData::new()
            .with("product_id", data.product_id)
            .with_opt("name", data.name)
            .with_opt("price", data.price)
    }
}

impl From<CartData> for EventData {
    fn from(data: CartData) -> Self {
        EventData::new()
            .with_opt("total", data.total)
            .with_opt("items", data.items)
    }
}

impl From<OrderData> for EventData {
    fn from(data: OrderData) -> Self {
        EventData::new()
            .with("order_id", data.order_id)
            .with_opt("total", data.total)
            .with_opt("items", data.items)
    }
}

impl From<UserData> for EventData {
    fn from(data: UserData) -> Self {
        EventData::new()
            .with("user_id", data.user_id)
            .with_opt("email", data.email)
            .with_opt("name", data.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_opt_skips_none() {
        let mut data = EventData::new();
        data.insert_opt("title", None::<String>)
            .insert_opt("referrer", Some("https://example.com"));
        assert!(!data.contains_key("title"));
        assert_eq!(data.get("referrer"), Some(&json!("https://example.com")));
    }

    #[test]
    fn test_explicit_null_is_kept() {
        let data = EventData::new().with("coupon", Value::Null);
        assert_eq!(serde_json::to_value(&data).unwrap(), json!({ "coupon": null }));
    }

    #[test]
    fn test_typed_fields_drop_absent() {
        let data: EventData = ProductData {
            product_id: "sku-1".into(),
            name: None,
            price: Some(19.99),
        }
        .into();
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({ "product_id": "sku-1", "price": 19.99 })
        );

        let data: EventData = CartData::default().into();
        assert!(data.is_empty());

        let data: EventData = UserData {
            user_id: "u1".into(),
            email: Some("a@b.c".into()),
            name: None,
        }
        .into();
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({ "user_id": "u1", "email": "a@b.c" })
        );
    }

    #[test]
    fn test_from_json_str() {
        let data = EventData::from_json_str(r#"{"plan": "pro", "seats": 3}"#).unwrap();
        assert_eq!(data.get("seats"), Some(&json!(3)));

        let err = EventData::from_json_str("[1, 2]").unwrap_err();
        assert_eq!(err.to_string(), "Invalid data: expected a JSON object, got an array");

        let err = EventData::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_envelope_serializes_flat() {
        let envelope = Envelope::new("order", EventData::new().with("order_id", "o-1"));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "type": "order", "order_id": "o-1" })
        );

        let parsed: Envelope =
            serde_json::from_value(json!({ "type": "signup", "plan": "pro" })).unwrap();
        assert_eq!(parsed.kind(), "signup");
        assert_eq!(parsed.fields().get("plan"), Some(&json!("pro")));
        assert!(!parsed.fields().contains_key("type"));
    }

    #[test]
    fn test_envelope_new_drops_type_field() {
        let envelope = Envelope::new(
            "order",
            EventData::new().with("type", "refund").with("order_id", "o-1"),
        );
        assert_eq!(envelope.kind(), "order");
        assert!(!envelope.fields().contains_key("type"));
        assert_eq!(
            serde_json::to_string(&envelope).unwrap(),
            r#"{"type":"order","order_id":"o-1"}"#
        );
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.as_str(), "POST");
    }
}
