//! Payment boundary
//!
//! No real gateway is integrated. [`SimulatedPayment`] approves a configurable
//! share of charges at random.

use crate::error::PaymentError;
use async_trait::async_trait;
use rand::Rng;
use tracing::info;

/// Default share of simulated charges that succeed
pub const DEFAULT_SUCCESS_RATE: f64 = 0.9;

/// Trait for payment gateways
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempt to charge the user for the confirmed booking
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the charge went through, `Ok(false)` if it was declined,
    /// or an error if the outcome is unknown
    async fn charge(&self) -> Result<bool, PaymentError>;
}

/// Random-outcome payment gateway
#[derive(Debug, Clone, Copy)]
pub struct SimulatedPayment {
    success_rate: f64,
}

impl SimulatedPayment {
    /// Create a gateway approving `success_rate` of charges (clamped to 0.0-1.0)
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

impl Default for SimulatedPayment {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_RATE)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPayment {
    async fn charge(&self) -> Result<bool, PaymentError> {
        let approved = rand::thread_rng().gen::<f64>() < self.success_rate;
        info!(approved, "Simulated payment processed");
        Ok(approved)
    }
}
