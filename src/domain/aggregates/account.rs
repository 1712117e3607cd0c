//! Account Aggregates: customers, sellers and administrators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::order::UnknownStatus;
use crate::domain::value_objects::not_blank;

/// Account kind embedded in every credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { Customer, Seller, Admin }

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Customer => "customer", Self::Seller => "seller", Self::Admin => "admin" }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SellerStatus {
    #[default]
    Pending,
    Approved,
    Disabled,
}

impl SellerStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "Pending", Self::Approved => "Approved", Self::Disabled => "Disabled" }
    }
}

impl FromStr for SellerStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Disabled" => Ok(Self::Disabled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)] pub street: String,
    #[serde(default)] pub city: String,
    #[serde(default)] pub state: String,
    #[serde(default)] pub zip: String,
    #[serde(default = "default_country")] pub country: String,
    #[serde(default)] pub is_default: bool,
}

fn default_country() -> String { "India".to_string() }

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub addresses: Vec<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    pub addresses: Option<Vec<Address>>,
    #[validate(length(min = 6))]
    pub password: Option<String>,
}

impl Customer {
    pub fn register(new: NewCustomer, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: new.name, email: normalize_email(&new.email), phone: new.phone,
            password_hash, addresses: vec![], created_at: now, updated_at: now,
        }
    }

    /// Applies a profile edit. Empty strings keep the existing value.
    pub fn apply(&mut self, update: ProfileUpdate, password_hash: Option<String>) {
        if let Some(name) = update.name.filter(|v| !v.trim().is_empty()) { self.name = name; }
        if let Some(phone) = update.phone.filter(|v| !v.trim().is_empty()) { self.phone = phone; }
        if let Some(addresses) = update.addresses { self.addresses = addresses; }
        if let Some(hash) = password_hash { self.password_hash = hash; }
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
    pub id: Uuid,
    pub owner_name: String,
    pub contact_no: String,
    pub shop_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub seller_address: String,
    pub shop_website: Option<String>,
    pub gst_number: String,
    pub id_proof: String,
    pub years_in_business: i32,
    pub customer_support: String,
    pub account_status: SellerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewSeller {
    #[validate(custom = "not_blank")]
    pub owner_name: String,
    #[validate(custom = "not_blank")]
    pub contact_no: String,
    #[validate(custom = "not_blank")]
    pub shop_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[validate(custom = "not_blank")]
    pub seller_address: String,
    pub shop_website: Option<String>,
    #[validate(custom = "not_blank")]
    pub gst_number: String,
    #[validate(custom = "not_blank")]
    pub id_proof: String,
    #[validate(range(min = 0, max = 200))]
    pub years_in_business: i32,
    #[validate(custom = "not_blank")]
    pub customer_support: String,
}

impl Seller {
    pub fn register(new: NewSeller, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), owner_name: new.owner_name, contact_no: new.contact_no, shop_name: new.shop_name,
            email: normalize_email(&new.email), password_hash, seller_address: new.seller_address,
            shop_website: new.shop_website, gst_number: new.gst_number, id_proof: new.id_proof,
            years_in_business: new.years_in_business, customer_support: new.customer_support,
            account_status: SellerStatus::Pending, created_at: now, updated_at: now,
        }
    }

    pub fn is_approved(&self) -> bool { self.account_status == SellerStatus::Approved }

    pub fn set_status(&mut self, status: SellerStatus) { self.account_status = status; self.updated_at = Utc::now(); }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Admin {
    pub fn register(email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), email: normalize_email(email), password_hash, created_at: now, updated_at: now }
    }
}

/// Login by email with a password.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }
