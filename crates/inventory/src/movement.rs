//! Stock movement audit view.
//!
//! Movements are not stored separately: each `StockMoved` / `StockCounted`
//! event on an inventory stream is one movement. This module projects those
//! events into the flat shape callers list and render.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockforge_catalog::ProductId;
use stockforge_core::{TenantId, UserId};

use crate::record::InventoryEvent;

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovementKind {
    Inbound,
    Outbound,
    StocktakeAbsolute,
}

impl MovementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Inbound => "inbound",
            MovementKind::Outbound => "outbound",
            MovementKind::StocktakeAbsolute => "stocktake-absolute",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementKind {
    type Err = stockforge_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "inbound" | "in" => Ok(MovementKind::Inbound),
            "outbound" | "out" => Ok(MovementKind::Outbound),
            "stocktake-absolute" | "stocktake" => Ok(MovementKind::StocktakeAbsolute),
            other => Err(stockforge_core::DomainError::invalid_argument(format!(
                "unknown movement kind: {other}"
            ))),
        }
    }
}

/// Immutable audit entry of one quantity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    /// Id of the underlying stored event.
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    /// Signed delta for inbound/outbound; the counted quantity for a stocktake.
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub operator: UserId,
    pub batch: Option<String>,
    pub note: Option<String>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Project a stored inventory event into a movement.
    ///
    /// Returns `None` for events that do not change the quantity.
    pub fn from_event(id: Uuid, event: &InventoryEvent) -> Option<Self> {
        match event {
            InventoryEvent::StockMoved(e) => Some(Self {
                id,
                tenant_id: e.tenant_id,
                product_id: e.product_id,
                kind: e.kind,
                quantity: e.delta,
                quantity_before: e.quantity_after - e.delta,
                quantity_after: e.quantity_after,
                operator: e.operator,
                batch: e.batch.clone(),
                note: e.note.clone(),
                reference: e.reference.clone(),
                created_at: e.occurred_at,
            }),
            InventoryEvent::StockCounted(e) => Some(Self {
                id,
                tenant_id: e.tenant_id,
                product_id: e.product_id,
                kind: MovementKind::StocktakeAbsolute,
                quantity: e.counted,
                quantity_before: e.previous,
                quantity_after: e.counted,
                operator: e.operator,
                batch: None,
                note: e.note.clone(),
                reference: None,
                created_at: e.occurred_at,
            }),
            InventoryEvent::RecordOpened(_) | InventoryEvent::WarningLineSet(_) => None,
        }
    }
}
