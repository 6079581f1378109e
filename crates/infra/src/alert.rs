//! Alert hook implementations.
//!
//! The ledger only raises the signal; these adapters decide where it goes.

use tracing::warn;

use stockforge_events::EventBus;
use stockforge_inventory::{AlertHook, ThresholdCrossed};

/// Logs each crossing at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertHook;

impl AlertHook for TracingAlertHook {
    fn on_threshold_crossed(&self, signal: &ThresholdCrossed) {
        warn!(
            tenant_id = %signal.tenant_id,
            product_id = %signal.product_id,
            quantity = signal.quantity,
            warning_line = signal.warning_line,
            "stock at or below warning line"
        );
    }
}

/// Publishes each crossing onto an `EventBus` (fire-and-forget).
#[derive(Debug)]
pub struct BusAlertHook<B> {
    bus: B,
}

impl<B> BusAlertHook<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> AlertHook for BusAlertHook<B>
where
    B: EventBus<ThresholdCrossed>,
{
    fn on_threshold_crossed(&self, signal: &ThresholdCrossed) {
        TracingAlertHook.on_threshold_crossed(signal);
        if let Err(e) = self.bus.publish(signal.clone()) {
            warn!(product_id = %signal.product_id, error = ?e, "alert publication failed");
        }
    }
}
