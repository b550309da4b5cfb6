//! Status enums and their transition tables.
//!
//! Orders, deliveries and returns all move through a fixed lifecycle. Each
//! status type lists its legal successors; every write path checks
//! [`Lifecycle::transition_to`] before touching the platform.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A status change that the lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move {entity} from {from} to {to}")]
pub struct TransitionError {
    /// Which kind of record was being changed.
    pub entity: &'static str,
    /// Current status.
    pub from: String,
    /// Requested status.
    pub to: String,
}

/// A status type with a fixed transition table.
pub trait Lifecycle: Copy + PartialEq + fmt::Display + 'static {
    /// Human name of the record kind, used in errors.
    const ENTITY: &'static str;

    /// Statuses reachable in one step from `self`.
    fn successors(self) -> &'static [Self];

    /// `true` if `next` is reachable in one step.
    fn can_transition_to(self, next: Self) -> bool {
        self.successors().contains(&next)
    }

    /// `true` if nothing can follow this status.
    fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Validate a transition, returning the new status.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if `next` is not a successor of `self`.
    fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: Self::ENTITY,
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

macro_rules! snake_case_display {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $text),+
                })
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!("invalid {}: {s}", stringify!($ty))),
                }
            }
        }
    };
}

/// Order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    ReturnRequested,
    Returned,
}

snake_case_display!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    ReturnRequested => "return_requested",
    Returned => "returned",
});

impl OrderStatus {
    /// Every order status, in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::ReturnRequested,
        Self::Returned,
    ];

    /// Orders the customer may still cancel.
    #[must_use]
    pub fn is_cancellable(self) -> bool {
        self.can_transition_to(Self::Cancelled)
    }
}

impl Lifecycle for OrderStatus {
    const ENTITY: &'static str = "order";

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped],
            Self::Shipped => &[Self::Delivered],
            Self::Delivered => &[Self::ReturnRequested],
            // A rejected return puts the order back to delivered.
            Self::ReturnRequested => &[Self::Returned, Self::Delivered],
            Self::Cancelled | Self::Returned => &[],
        }
    }
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

snake_case_display!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// Delivery lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Failed,
    Cancelled,
}

snake_case_display!(DeliveryStatus {
    Pending => "pending",
    Assigned => "assigned",
    PickedUp => "picked_up",
    InTransit => "in_transit",
    Delivered => "delivered",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl DeliveryStatus {
    /// Location samples are only accepted in this state.
    #[must_use]
    pub fn accepts_location(self) -> bool {
        self == Self::InTransit
    }

    /// The order status implied by reaching this delivery status, if any.
    #[must_use]
    pub const fn implied_order_status(self) -> Option<OrderStatus> {
        match self {
            Self::PickedUp | Self::InTransit => Some(OrderStatus::Shipped),
            Self::Delivered => Some(OrderStatus::Delivered),
            Self::Pending | Self::Assigned | Self::Failed | Self::Cancelled => None,
        }
    }
}

impl Lifecycle for DeliveryStatus {
    const ENTITY: &'static str = "delivery";

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Assigned, Self::Cancelled],
            Self::Assigned => &[Self::PickedUp, Self::Cancelled],
            Self::PickedUp => &[Self::InTransit, Self::Cancelled],
            Self::InTransit => &[Self::Delivered, Self::Failed],
            Self::Delivered | Self::Failed | Self::Cancelled => &[],
        }
    }
}

/// Return request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    #[default]
    Requested,
    Approved,
    Rejected,
    PickedUp,
    Refunded,
}

snake_case_display!(ReturnStatus {
    Requested => "requested",
    Approved => "approved",
    Rejected => "rejected",
    PickedUp => "picked_up",
    Refunded => "refunded",
});

impl Lifecycle for ReturnStatus {
    const ENTITY: &'static str = "return";

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Requested => &[Self::Approved, Self::Rejected],
            Self::Approved => &[Self::PickedUp],
            Self::PickedUp => &[Self::Refunded],
            Self::Rejected | Self::Refunded => &[],
        }
    }
}

/// Role stored on a profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper.
    #[default]
    Customer,
    /// Back office staff.
    Admin,
    /// Courier using the delivery portal.
    DeliveryPartner,
}

snake_case_display!(UserRole {
    Customer => "customer",
    Admin => "admin",
    DeliveryPartner => "delivery_partner",
});
