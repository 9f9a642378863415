use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque host order identifier.
pub type OrderId = i64;

/// Which of the two address records on an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Billing,
    Shipping,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Billing, Role::Shipping];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Billing => "billing",
            Role::Shipping => "shipping",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "billing" => Ok(Role::Billing),
            "shipping" => Ok(Role::Shipping),
            other => Err(format!("unknown address role '{other}'")),
        }
    }
}

/// Recognized address fields, in canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "first_name")]
    FirstName,
    #[serde(rename = "last_name")]
    LastName,
    #[serde(rename = "company")]
    Company,
    #[serde(rename = "address_1")]
    Address1,
    #[serde(rename = "address_2")]
    Address2,
    #[serde(rename = "city")]
    City,
    #[serde(rename = "state")]
    State,
    #[serde(rename = "postcode")]
    Postcode,
    #[serde(rename = "country")]
    Country,
    #[serde(rename = "phone")]
    Phone,
}

impl Field {
    /// All ten fields, phone included. This is the default sync field list.
    pub const ALL: [Field; 10] = [
        Field::FirstName,
        Field::LastName,
        Field::Company,
        Field::Address1,
        Field::Address2,
        Field::City,
        Field::State,
        Field::Postcode,
        Field::Country,
        Field::Phone,
    ];

    /// The nine postal fields (no phone).
    pub const ADDRESS_ONLY: [Field; 9] = [
        Field::FirstName,
        Field::LastName,
        Field::Company,
        Field::Address1,
        Field::Address2,
        Field::City,
        Field::State,
        Field::Postcode,
        Field::Country,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Company => "company",
            Field::Address1 => "address_1",
            Field::Address2 => "address_2",
            Field::City => "city",
            Field::State => "state",
            Field::Postcode => "postcode",
            Field::Country => "country",
            Field::Phone => "phone",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == t)
            .ok_or_else(|| format!("unknown address field '{t}'"))
    }
}

/// One role's address for one order.
///
/// Absent and empty are the same thing: every field defaults to `""`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressRecord {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub phone: String,
}

impl AddressRecord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::FirstName => &self.first_name,
            Field::LastName => &self.last_name,
            Field::Company => &self.company,
            Field::Address1 => &self.address_1,
            Field::Address2 => &self.address_2,
            Field::City => &self.city,
            Field::State => &self.state,
            Field::Postcode => &self.postcode,
            Field::Country => &self.country,
            Field::Phone => &self.phone,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::FirstName => &mut self.first_name,
            Field::LastName => &mut self.last_name,
            Field::Company => &mut self.company,
            Field::Address1 => &mut self.address_1,
            Field::Address2 => &mut self.address_2,
            Field::City => &mut self.city,
            Field::State => &mut self.state,
            Field::Postcode => &mut self.postcode,
            Field::Country => &mut self.country,
            Field::Phone => &mut self.phone,
        };
        *slot = value.into();
    }

    pub fn is_empty_field(&self, field: Field) -> bool {
        self.get(field).is_empty()
    }

    /// Builder-style setter, handy for fixtures.
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }
}

/// Both address records of an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAddresses {
    pub billing: AddressRecord,
    pub shipping: AddressRecord,
}

impl OrderAddresses {
    pub fn new(billing: AddressRecord, shipping: AddressRecord) -> Self {
        Self { billing, shipping }
    }

    pub fn record(&self, role: Role) -> &AddressRecord {
        match role {
            Role::Billing => &self.billing,
            Role::Shipping => &self.shipping,
        }
    }

    pub fn record_mut(&mut self, role: Role) -> &mut AddressRecord {
        match role {
            Role::Billing => &mut self.billing,
            Role::Shipping => &mut self.shipping,
        }
    }
}

/// Which way values may flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    #[default]
    Both,
    BillingToShipping,
    ShippingToBilling,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Both => "both",
            SyncDirection::BillingToShipping => "billing_to_shipping",
            SyncDirection::ShippingToBilling => "shipping_to_billing",
        }
    }

    /// `true` when this direction allows writes into `target`.
    pub fn writes_to(&self, target: Role) -> bool {
        matches!(
            (self, target),
            (SyncDirection::Both, _)
                | (SyncDirection::BillingToShipping, Role::Shipping)
                | (SyncDirection::ShippingToBilling, Role::Billing)
        )
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "both" => Ok(SyncDirection::Both),
            "billing_to_shipping" => Ok(SyncDirection::BillingToShipping),
            "shipping_to_billing" => Ok(SyncDirection::ShippingToBilling),
            other => Err(format!(
                "invalid sync direction '{other}'. expected one of: both | billing_to_shipping | shipping_to_billing"
            )),
        }
    }
}

/// Process-wide sync settings. Read fresh at the start of every sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Gates the automatic triggers only; manual and bulk syncs ignore it.
    pub auto_sync_enabled: bool,
    pub direction: SyncDirection,
    pub fields: Vec<Field>,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            auto_sync_enabled: true,
            direction: SyncDirection::Both,
            fields: Field::ALL.to_vec(),
        }
    }
}

/// One computed field write.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldWrite {
    pub role: Role,
    pub field: Field,
    pub value: String,
}

impl FieldWrite {
    pub fn new(role: Role, field: Field, value: impl Into<String>) -> Self {
        Self {
            role,
            field,
            value: value.into(),
        }
    }

    /// `"{role}_{field}"`, the key shape used by exclusion sets.
    pub fn key(&self) -> String {
        format!("{}_{}", self.role, self.field)
    }
}

/// Host order lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    Draft,
}

impl OrderStatus {
    /// Statuses eligible for bulk sync.
    pub const ACTIVE: [OrderStatus; 4] = [
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Pending,
        OrderStatus::OnHold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
            OrderStatus::Draft => "draft",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the host's "wc-" prefixed form as well.
        let lower = s.trim().to_ascii_lowercase();
        let t = lower.strip_prefix("wc-").unwrap_or(lower.as_str());
        match t {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "on-hold" => Ok(OrderStatus::OnHold),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            "failed" => Ok(OrderStatus::Failed),
            "draft" | "checkout-draft" => Ok(OrderStatus::Draft),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}
