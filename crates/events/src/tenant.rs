use stockforge_core::TenantId;

/// Marks messages that belong to exactly one tenant.
///
/// Consumers of a shared bus use this to keep per-tenant state (e.g. an alert
/// inbox) from leaking across tenants.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}
