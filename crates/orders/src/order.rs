use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockforge_catalog::ProductId;
use stockforge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId, UserId};
use stockforge_events::Event;

use crate::number::OrderNumber;
use crate::status::OrderStatus;

/// Order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for OrderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Order line: product, quantity, unit price snapshot and computed amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    /// Always `quantity * unit_price`.
    pub amount: Money,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    tenant_id: Option<TenantId>,
    number: Option<OrderNumber>,
    customer_name: String,
    customer_phone: Option<String>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    total: Money,
    operator: Option<UserId>,
    remark: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            number: None,
            customer_name: String::new(),
            customer_phone: None,
            status: OrderStatus::Pending,
            lines: Vec::new(),
            total: Money::ZERO,
            operator: None,
            remark: None,
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn number(&self) -> Option<&OrderNumber> {
        self.number.as_ref()
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn customer_phone(&self) -> Option<&str> {
        self.customer_phone.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn operator(&self) -> Option<UserId> {
        self.operator
    }

    pub fn remark(&self) -> Option<&str> {
        self.remark.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// A requested line with its price already resolved (catalog snapshot or override).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub lines: Vec<RequestedLine>,
    pub operator: UserId,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ChangeStatus(ChangeStatus),
}

/// Event: OrderPlaced (order and all of its lines, created together).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub operator: UserId,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderStatusChanged(OrderStatusChanged),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderStatusChanged(_) => "orders.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.number = Some(e.order_number.clone());
                self.customer_name = e.customer_name.clone();
                self.customer_phone = e.customer_phone.clone();
                self.status = OrderStatus::Pending;
                self.lines = e.lines.clone();
                self.total = e.total;
                self.operator = Some(e.operator);
                self.remark = e.remark.clone();
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

/// Price every requested line and total them with checked fixed-point arithmetic.
pub fn price_lines(lines: &[RequestedLine]) -> Result<(Vec<OrderLine>, Money), DomainError> {
    let mut priced = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.quantity <= 0 {
            return Err(DomainError::invalid_argument(format!(
                "line {} quantity must be positive",
                idx + 1
            )));
        }
        let amount = line
            .unit_price
            .checked_mul_qty(line.quantity)
            .ok_or_else(|| DomainError::invalid_argument("line amount overflow"))?;
        priced.push(OrderLine {
            line_no: (idx as u32) + 1,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            amount,
        });
    }

    let total = Money::checked_sum(priced.iter().map(|l| l.amount))
        .ok_or_else(|| DomainError::invalid_argument("order total overflow"))?;
    Ok((priced, total))
}

impl Order {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        self.ensure_order_id(cmd.order_id)?;

        let customer_name = cmd.customer_name.trim();
        if customer_name.is_empty() {
            return Err(DomainError::invalid_argument("customer name is required"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::invalid_argument("order must have at least one line"));
        }

        let (lines, total) = price_lines(&cmd.lines)?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            customer_name: customer_name.to_string(),
            customer_phone: cmd.customer_phone.clone(),
            lines,
            total,
            operator: cmd.operator,
            remark: cmd.remark.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("order {}", cmd.order_id)));
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        self.status.check_transition(cmd.status)?;

        Ok(vec![OrderEvent::OrderStatusChanged(OrderStatusChanged {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.status,
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        })])
    }
}
