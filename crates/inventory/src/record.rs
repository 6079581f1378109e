use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockforge_catalog::ProductId;
use stockforge_core::{Aggregate, AggregateRoot, DomainError, TenantId, UserId};
use stockforge_events::Event;

use crate::movement::MovementKind;

/// Aggregate root: InventoryRecord (one per tenant + product).
///
/// A record with no events is a valid, never-touched record: quantity 0,
/// warning line 0 (disabled). The first command on it also emits `RecordOpened`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    id: ProductId,
    tenant_id: Option<TenantId>,
    quantity: i64,
    warning_line: i64,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    opened: bool,
}

impl InventoryRecord {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            quantity: 0,
            warning_line: 0,
            updated_at: None,
            version: 0,
            opened: false,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn warning_line(&self) -> i64 {
        self.warning_line
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    /// Whether the record currently sits at or below an enabled warning line.
    pub fn is_low(&self) -> bool {
        self.warning_line > 0 && self.quantity <= self.warning_line
    }
}

impl AggregateRoot for InventoryRecord {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenRecord (get-or-create).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRecord {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (signed delta, inbound or outbound).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub kind: MovementKind,
    pub operator: UserId,
    pub batch: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TakeStock (absolute overwrite after a physical count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub operator: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetWarningLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetWarningLine {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub threshold: i64,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock.
///
/// Deducts every requested line quantity for one product, or nothing at all.
/// Each quantity becomes its own outbound movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantities: Vec<i64>,
    pub operator: UserId,
    /// Business reference, e.g. the order number the stock was reserved for.
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    OpenRecord(OpenRecord),
    AdjustStock(AdjustStock),
    TakeStock(TakeStock),
    SetWarningLine(SetWarningLine),
    ReserveStock(ReserveStock),
}

/// Event: RecordOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOpened {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMoved (inbound/outbound movement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub delta: i64,
    pub quantity_after: i64,
    pub operator: UserId,
    pub batch: Option<String>,
    pub note: Option<String>,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockCounted (stocktake-absolute movement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCounted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub previous: i64,
    pub counted: i64,
    pub operator: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WarningLineSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningLineSet {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub threshold: i64,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    RecordOpened(RecordOpened),
    StockMoved(StockMoved),
    StockCounted(StockCounted),
    WarningLineSet(WarningLineSet),
}

impl InventoryEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            InventoryEvent::RecordOpened(e) => e.tenant_id,
            InventoryEvent::StockMoved(e) => e.tenant_id,
            InventoryEvent::StockCounted(e) => e.tenant_id,
            InventoryEvent::WarningLineSet(e) => e.tenant_id,
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            InventoryEvent::RecordOpened(e) => e.product_id,
            InventoryEvent::StockMoved(e) => e.product_id,
            InventoryEvent::StockCounted(e) => e.product_id,
            InventoryEvent::WarningLineSet(e) => e.product_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::RecordOpened(_) => "inventory.record.opened",
            InventoryEvent::StockMoved(_) => "inventory.record.stock_moved",
            InventoryEvent::StockCounted(_) => "inventory.record.stock_counted",
            InventoryEvent::WarningLineSet(_) => "inventory.record.warning_line_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::RecordOpened(e) => e.occurred_at,
            InventoryEvent::StockMoved(e) => e.occurred_at,
            InventoryEvent::StockCounted(e) => e.occurred_at,
            InventoryEvent::WarningLineSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryRecord {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::RecordOpened(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.quantity = 0;
                self.warning_line = 0;
                self.opened = true;
            }
            InventoryEvent::StockMoved(e) => {
                self.quantity += e.delta;
            }
            InventoryEvent::StockCounted(e) => {
                self.quantity = e.counted;
            }
            InventoryEvent::WarningLineSet(e) => {
                self.warning_line = e.threshold;
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::OpenRecord(cmd) => self.handle_open(cmd),
            InventoryCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            InventoryCommand::TakeStock(cmd) => self.handle_take_stock(cmd),
            InventoryCommand::SetWarningLine(cmd) => self.handle_set_warning_line(cmd),
            InventoryCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
        }
    }
}

impl InventoryRecord {
    fn ensure_target(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        if self.opened && self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    /// Events needed before any change: `RecordOpened` for a never-touched record.
    fn opening(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
    ) -> Vec<InventoryEvent> {
        if self.opened {
            return vec![];
        }
        vec![InventoryEvent::RecordOpened(RecordOpened {
            tenant_id,
            product_id,
            occurred_at,
        })]
    }

    fn handle_open(&self, cmd: &OpenRecord) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;
        Ok(self.opening(cmd.tenant_id, cmd.product_id, cmd.occurred_at))
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;

        match cmd.kind {
            MovementKind::Inbound if cmd.delta <= 0 => {
                return Err(DomainError::invalid_argument("inbound delta must be positive"));
            }
            MovementKind::Outbound if cmd.delta >= 0 => {
                return Err(DomainError::invalid_argument("outbound delta must be negative"));
            }
            MovementKind::StocktakeAbsolute => {
                return Err(DomainError::invalid_argument(
                    "stocktake is an absolute set, not an adjustment",
                ));
            }
            _ => {}
        }

        let quantity_after = self
            .quantity
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::invalid_argument("quantity overflow"))?;
        if quantity_after < 0 {
            return Err(DomainError::insufficient_stock(
                cmd.product_id,
                cmd.delta.saturating_neg(),
                self.quantity,
            ));
        }

        let mut events = self.opening(cmd.tenant_id, cmd.product_id, cmd.occurred_at);
        events.push(InventoryEvent::StockMoved(StockMoved {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            kind: cmd.kind,
            delta: cmd.delta,
            quantity_after,
            operator: cmd.operator,
            batch: cmd.batch.clone(),
            note: cmd.note.clone(),
            reference: None,
            occurred_at: cmd.occurred_at,
        }));
        Ok(events)
    }

    fn handle_take_stock(&self, cmd: &TakeStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;

        if cmd.quantity < 0 {
            return Err(DomainError::invalid_argument("counted quantity cannot be negative"));
        }

        let mut events = self.opening(cmd.tenant_id, cmd.product_id, cmd.occurred_at);
        events.push(InventoryEvent::StockCounted(StockCounted {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            previous: self.quantity,
            counted: cmd.quantity,
            operator: cmd.operator,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        }));
        Ok(events)
    }

    fn handle_set_warning_line(&self, cmd: &SetWarningLine) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;

        if cmd.threshold < 0 {
            return Err(DomainError::invalid_argument("warning line cannot be negative"));
        }

        let mut events = self.opening(cmd.tenant_id, cmd.product_id, cmd.occurred_at);
        events.push(InventoryEvent::WarningLineSet(WarningLineSet {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            threshold: cmd.threshold,
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }));
        Ok(events)
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;

        if cmd.quantities.is_empty() {
            return Err(DomainError::invalid_argument("reservation has no lines"));
        }
        if cmd.quantities.iter().any(|q| *q <= 0) {
            return Err(DomainError::invalid_argument("reserved quantity must be positive"));
        }

        let requested = cmd
            .quantities
            .iter()
            .try_fold(0i64, |acc, q| acc.checked_add(*q))
            .ok_or_else(|| DomainError::invalid_argument("quantity overflow"))?;
        if requested > self.quantity {
            return Err(DomainError::insufficient_stock(
                cmd.product_id,
                requested,
                self.quantity,
            ));
        }

        let mut events = self.opening(cmd.tenant_id, cmd.product_id, cmd.occurred_at);
        let mut remaining = self.quantity;
        for quantity in &cmd.quantities {
            remaining -= quantity;
            events.push(InventoryEvent::StockMoved(StockMoved {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                kind: MovementKind::Outbound,
                delta: -quantity,
                quantity_after: remaining,
                operator: cmd.operator,
                batch: None,
                note: None,
                reference: cmd.reference.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }
        Ok(events)
    }
}
