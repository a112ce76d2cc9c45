use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinate::Address;

/// Order lifecycle states.
///
/// ```text
/// Pending ─► Confirmed ─► Preparing ─► Ready ─► PickedUp ─► Delivered
///    │           │            │          │          │
///    └───────────┴────────────┴──────────┴──────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The single legal forward successor, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::PickedUp),
            OrderStatus::PickedUp => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    /// True when both are on the forward chain and `self` comes first.
    /// `Cancelled` is off the chain and precedes nothing.
    pub fn precedes(&self, other: &OrderStatus) -> bool {
        match (self.chain_position(), other.chain_position()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    fn chain_position(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::Ready => Some(3),
            OrderStatus::PickedUp => Some(4),
            OrderStatus::Delivered => Some(5),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// True once the driver holds the food.
    pub fn is_out_for_delivery(&self) -> bool {
        matches!(self, OrderStatus::PickedUp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
    Failed,
}

/// All amounts in currency minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub subtotal: i64,
    pub tax: i64,
    pub delivery_fee: i64,
    pub platform_fee: i64,
    pub total: i64,
}

impl Pricing {
    pub fn new(subtotal: i64, tax: i64, delivery_fee: i64, platform_fee: i64) -> Self {
        Self {
            subtotal,
            tax,
            delivery_fee,
            platform_fee,
            total: subtotal + tax + delivery_fee + platform_fee,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal + self.tax + self.delivery_fee + self.platform_fee
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earnings {
    pub vendor_earnings: i64,
    pub driver_earnings: i64,
    pub platform_commission: i64,
}

impl Earnings {
    /// Earnings must account for exactly the tax-exclusive total.
    pub fn reconciles_with(&self, pricing: &Pricing) -> bool {
        self.vendor_earnings + self.driver_earnings + self.platform_commission
            == pricing.total - pricing.tax
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addresses {
    pub pickup: Address,
    pub delivery: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub ordered: DateTime<Utc>,
    pub confirmed: Option<DateTime<Utc>>,
    pub preparing: Option<DateTime<Utc>>,
    pub ready: Option<DateTime<Utc>>,
    pub picked_up: Option<DateTime<Utc>>,
    pub delivered: Option<DateTime<Utc>>,
    pub cancelled: Option<DateTime<Utc>>,
}

impl Timeline {
    pub fn new(ordered: DateTime<Utc>) -> Self {
        Self {
            ordered,
            confirmed: None,
            preparing: None,
            ready: None,
            picked_up: None,
            delivered: None,
            cancelled: None,
        }
    }

    pub fn stamp_for(&self, status: OrderStatus) -> Option<DateTime<Utc>> {
        match status {
            OrderStatus::Pending => Some(self.ordered),
            OrderStatus::Confirmed => self.confirmed,
            OrderStatus::Preparing => self.preparing,
            OrderStatus::Ready => self.ready,
            OrderStatus::PickedUp => self.picked_up,
            OrderStatus::Delivered => self.delivered,
            OrderStatus::Cancelled => self.cancelled,
        }
    }

    /// Sets a phase stamp once. Returns the stamp that ends up recorded.
    pub fn stamp(&mut self, status: OrderStatus, at: DateTime<Utc>) -> DateTime<Utc> {
        let slot = match status {
            OrderStatus::Pending => return self.ordered,
            OrderStatus::Confirmed => &mut self.confirmed,
            OrderStatus::Preparing => &mut self.preparing,
            OrderStatus::Ready => &mut self.ready,
            OrderStatus::PickedUp => &mut self.picked_up,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
        };
        *slot.get_or_insert(at)
    }

    pub fn latest(&self) -> DateTime<Utc> {
        [
            self.confirmed,
            self.preparing,
            self.ready,
            self.picked_up,
            self.delivered,
            self.cancelled,
        ]
        .into_iter()
        .flatten()
        .fold(self.ordered, |latest, stamp| latest.max(stamp))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: OrderStatus,
    pub pricing: Pricing,
    pub earnings: Earnings,
    pub addresses: Addresses,
    pub timeline: Timeline,
    pub cancellation_reason: Option<String>,
    pub payment_status: PaymentStatus,
    /// Same instant as `timeline.ordered`; never changes after creation.
    pub created_at: DateTime<Utc>,
}
