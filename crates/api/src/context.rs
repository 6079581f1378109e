use stockforge_core::{TenantId, UserId};

/// Tenant context for a request.
///
/// Immutable and present on every domain route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// The acting operator, recorded on every movement and order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OperatorContext {
    operator_id: UserId,
}

impl OperatorContext {
    pub fn new(operator_id: UserId) -> Self {
        Self { operator_id }
    }

    pub fn operator_id(&self) -> UserId {
        self.operator_id
    }
}
