//! Value Objects for the marketplace

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::EcommerceError;

/// Parses an entity identifier, rejecting anything that is not a UUID.
pub fn parse_id(raw: &str) -> Result<Uuid, EcommerceError> {
    Uuid::parse_str(raw.trim()).map_err(|_| EcommerceError::InvalidReference(raw.to_string()))
}

/// Quantity of one line item. Always at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("Quantity must be a positive integer")]
    NotPositive,
    #[error("Quantity is too large")]
    TooLarge,
    #[error("Quantity must be an integer, got {0}")]
    NotInteger(String),
}

impl Quantity {
    /// Largest quantity a single line may request; stock is stored as a signed 32-bit count.
    pub const MAX: u32 = i32::MAX as u32;

    pub fn new(value: u32) -> Result<Self, QuantityError> {
        match value {
            0 => Err(QuantityError::NotPositive),
            v if v > Self::MAX => Err(QuantityError::TooLarge),
            v => Ok(Self(v)),
        }
    }

    /// Reads a client-supplied quantity.
    ///
    /// Absent or falsy values (`null`, `0`, `""`, `false`) default to 1. Anything else must be a
    /// positive integer, either as a JSON number or a numeric string.
    pub fn from_request(raw: Option<&Value>) -> Result<Self, QuantityError> {
        match raw {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(Self(1)),
            Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
                (Some(0), _) => Ok(Self(1)),
                (Some(v), _) => Self::from_signed(v),
                (None, Some(f)) if f == 0.0 => Ok(Self(1)),
                _ => Err(QuantityError::NotInteger(n.to_string())),
            },
            Some(Value::String(s)) if s.trim().is_empty() => Ok(Self(1)),
            Some(Value::String(s)) => s.trim().parse::<i64>()
                .map_err(|_| QuantityError::NotInteger(s.clone()))
                .and_then(Self::from_signed),
            Some(other) => Err(QuantityError::NotInteger(other.to_string())),
        }
    }

    fn from_signed(value: i64) -> Result<Self, QuantityError> {
        if value <= 0 { return Err(QuantityError::NotPositive); }
        u32::try_from(value).map_err(|_| QuantityError::TooLarge).and_then(Self::new)
    }

    pub fn value(&self) -> u32 { self.0 }

    /// Same value as a stock delta; always fits because of [`Quantity::MAX`].
    pub fn as_stock(&self) -> i32 { self.0 as i32 }

    pub fn checked_add(&self, other: Quantity) -> Option<Self> {
        self.0.checked_add(other.0).filter(|v| *v <= Self::MAX).map(Self)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> u32 { q.0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Where an order ships to. Everything except the second address line is required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub full_name: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub phone: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub city: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub state: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub postal_code: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub country: String,
}

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { Err(ValidationError::new("required")) } else { Ok(()) }
}
