use chrono::Duration;
use dispatch_common::Paise;

/// The single pricing rule applied when an order is created. Totals are stored on the order and never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Flat fee added to orders whose items total is below the threshold
    pub delivery_fee: Paise,
    pub free_delivery_threshold: Paise,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self { delivery_fee: Paise::from_rupees(50), free_delivery_threshold: Paise::from_rupees(500) }
    }
}

impl PricingPolicy {
    pub fn delivery_fee_for(&self, items_total: Paise) -> Paise {
        if items_total < self.free_delivery_threshold {
            self.delivery_fee
        } else {
            Paise::default()
        }
    }
}

/// Tunables for courier matching and the handoff protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchPolicy {
    /// First search radius, in metres
    pub near_radius_m: f64,
    /// Fallback search radius, used only when nobody is within `near_radius_m`
    pub far_radius_m: f64,
    pub handoff_code_ttl: Duration,
    /// Broadcasts older than this are cancelled and re-dispatched. `None` means offers never expire.
    pub broadcast_ttl: Option<Duration>,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            near_radius_m: 5_000.0,
            far_radius_m: 20_000.0,
            handoff_code_ttl: Duration::minutes(10),
            broadcast_ttl: None,
        }
    }
}
