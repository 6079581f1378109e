use serde::Deserialize;
use serde_json::{Value, json};

use stockforge_catalog::Product;
use stockforge_core::Money;
use stockforge_infra::{CreateOrderRequest, DispatchError, OrderLineRequest};
use stockforge_inventory::{InventoryRecord, StockMovement, ThresholdCrossed};
use stockforge_orders::Order;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductBody {
    pub sku: String,
    /// Decimal string, e.g. "10.00".
    #[serde(alias = "unitPrice")]
    pub unit_price: String,
}

#[derive(Debug, Deserialize)]
pub struct StocktakeBody {
    pub quantity: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WarningLineBody {
    pub threshold: i64,
}

#[derive(Debug, Deserialize)]
pub struct StockMovementBody {
    #[serde(alias = "product_id")]
    pub product: String,
    pub kind: String,
    pub quantity: i64,
    pub batch: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub product_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineBody {
    #[serde(alias = "product_id")]
    pub product: String,
    pub quantity: i64,
    pub price: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    #[serde(alias = "customer_name")]
    pub customer_name: String,
    #[serde(alias = "customer_phone")]
    pub customer_phone: Option<String>,
    pub lines: Vec<OrderLineBody>,
    pub remark: Option<String>,
}

impl CreateOrderBody {
    pub fn into_request(self) -> Result<CreateOrderRequest, DispatchError> {
        let lines = self
            .lines
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let product_id = line
                    .product
                    .parse()
                    .map_err(|_| DispatchError::InvalidArgument(format!("line {}: invalid product id", idx + 1)))?;
                let unit_price = line
                    .price
                    .map(|p| parse_money(&p))
                    .transpose()
                    .map_err(|e| DispatchError::InvalidArgument(format!("line {}: {e}", idx + 1)))?;
                Ok(OrderLineRequest {
                    product_id,
                    quantity: line.quantity,
                    unit_price,
                })
            })
            .collect::<Result<Vec<_>, DispatchError>>()?;

        Ok(CreateOrderRequest {
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            lines,
            remark: self.remark,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

pub fn parse_money(raw: &str) -> Result<Money, String> {
    raw.parse::<Money>().map_err(|_| format!("invalid amount '{raw}'"))
}

// -------------------------
// Response mapping
// -------------------------

pub fn product_to_json(p: &Product) -> Value {
    json!({
        "id": p.id.to_string(),
        "sku": p.sku,
        "unit_price": p.unit_price.to_string(),
    })
}

pub fn inventory_to_json(r: &InventoryRecord) -> Value {
    json!({
        "product_id": r.product_id().to_string(),
        "quantity": r.quantity(),
        "warning_line": r.warning_line(),
        "low": r.is_low(),
        "updated_at": r.updated_at(),
    })
}

pub fn movement_to_json(m: &StockMovement) -> Value {
    json!({
        "id": m.id.to_string(),
        "product_id": m.product_id.to_string(),
        "kind": m.kind.as_str(),
        "quantity": m.quantity,
        "quantity_before": m.quantity_before,
        "quantity_after": m.quantity_after,
        "operator": m.operator.to_string(),
        "batch": m.batch,
        "note": m.note,
        "reference": m.reference,
        "created_at": m.created_at,
    })
}

pub fn order_to_json(o: &Order) -> Value {
    json!({
        "id": o.id_typed().to_string(),
        "order_no": o.number().map(|n| n.to_string()),
        "customer_name": o.customer_name(),
        "customer_phone": o.customer_phone(),
        "status": o.status().as_str(),
        "total": o.total().to_string(),
        "lines": o.lines().iter().map(|l| json!({
            "line_no": l.line_no,
            "product_id": l.product_id.to_string(),
            "quantity": l.quantity,
            "unit_price": l.unit_price.to_string(),
            "amount": l.amount.to_string(),
        })).collect::<Vec<_>>(),
        "operator": o.operator().map(|u| u.to_string()),
        "remark": o.remark(),
        "created_at": o.created_at(),
        "updated_at": o.updated_at(),
    })
}

pub fn alert_to_json(a: &ThresholdCrossed) -> Value {
    json!({
        "product_id": a.product_id.to_string(),
        "quantity": a.quantity,
        "warning_line": a.warning_line,
        "occurred_at": a.occurred_at,
    })
}
