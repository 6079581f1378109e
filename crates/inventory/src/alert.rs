//! Low-stock alerting.
//!
//! An alert fires when a committed change takes the quantity from above the
//! warning line to at or below it. Staying below the line does not re-fire; the
//! record has to recover above the line first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockforge_catalog::ProductId;
use stockforge_core::TenantId;
use stockforge_events::TenantScoped;

/// Whether a change from `before` to `after` crosses an enabled warning line.
///
/// A threshold of 0 disables alerting.
pub fn crossed_warning_line(before: i64, after: i64, threshold: i64) -> bool {
    threshold > 0 && before > threshold && after <= threshold
}

/// Signal emitted once per crossing, after the change is durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdCrossed {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub warning_line: i64,
    pub occurred_at: DateTime<Utc>,
}

impl TenantScoped for ThresholdCrossed {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Receiver of threshold crossings.
///
/// Implementations must not fail the stock change that triggered them; delivery
/// is best-effort.
pub trait AlertHook: Send + Sync {
    fn on_threshold_crossed(&self, signal: &ThresholdCrossed);
}

impl<H> AlertHook for Arc<H>
where
    H: AlertHook + ?Sized,
{
    fn on_threshold_crossed(&self, signal: &ThresholdCrossed) {
        (**self).on_threshold_crossed(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_on_the_downward_crossing() {
        assert!(crossed_warning_line(10, 5, 5));
        assert!(crossed_warning_line(6, 0, 5));
        assert!(!crossed_warning_line(5, 4, 5));
        assert!(!crossed_warning_line(4, 6, 5));
        assert!(!crossed_warning_line(10, 6, 5));
    }

    #[test]
    fn zero_threshold_disables_alerting() {
        assert!(!crossed_warning_line(10, 0, 0));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a crossing always ends at or below the line and starts above it.
            #[test]
            fn crossing_implies_line_between(before in -5i64..100, after in -5i64..100, threshold in 0i64..50) {
                if crossed_warning_line(before, after, threshold) {
                    prop_assert!(threshold > 0);
                    prop_assert!(before > threshold);
                    prop_assert!(after <= threshold);
                }
            }
        }
    }
}
