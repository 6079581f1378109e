use serde::{Deserialize, Serialize};

use stockforge_core::DomainError;

/// Order status lifecycle.
///
/// `pending` → `processing` → `completed`, with `cancelled` reachable from
/// either non-terminal state. `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Validate a move from `self` to `to`.
    ///
    /// Leaving a terminal state is a `Conflict` whatever the target; any other
    /// move outside the lifecycle (including to the same status) is an
    /// `InvalidArgument`.
    pub fn check_transition(self, to: OrderStatus) -> Result<(), DomainError> {
        if self.is_terminal() {
            return Err(DomainError::conflict(format!(
                "order already finalized ({self})"
            )));
        }

        match (self, to) {
            (OrderStatus::Pending, OrderStatus::Processing)
            | (OrderStatus::Pending, OrderStatus::Cancelled)
            | (OrderStatus::Processing, OrderStatus::Completed)
            | (OrderStatus::Processing, OrderStatus::Cancelled) => Ok(()),
            (from, to) => Err(DomainError::invalid_argument(format!(
                "cannot change order status from {from} to {to}"
            ))),
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::invalid_argument(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}
