//! # Core Logic - Gas Configuration
//!
//! Gas pricing knobs and multiplier scaling shared by every chain. This
//! module provides configuration only; the chain client does the fetching.

use serde::Deserialize;

/// Standard gas limits for common operations
#[derive(Debug, Clone, Copy)]
pub struct StandardGasLimits {
    pub transfer: u64,
    pub fallback: u64,
}

impl Default for StandardGasLimits {
    fn default() -> Self {
        Self {
            transfer: 21_000,
            fallback: 100_000,
        }
    }
}

/// Configuration for gas management
#[derive(Debug, Clone)]
pub struct GasConfig {
    /// Applied to the recommended price when building a transaction
    pub price_multiplier: f64,
    /// Applied to the recommended price when replacing a stuck transaction
    pub cancel_multiplier: f64,
    pub limits: StandardGasLimits,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            price_multiplier: 1.2,
            cancel_multiplier: 1.5,
            limits: StandardGasLimits::default(),
        }
    }
}

impl GasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price_multiplier(mut self, multiplier: f64) -> Self {
        self.price_multiplier = multiplier;
        self
    }

    pub fn with_cancel_multiplier(mut self, multiplier: f64) -> Self {
        self.cancel_multiplier = multiplier;
        self
    }

    pub fn with_fallback_limit(mut self, limit: u64) -> Self {
        self.limits.fallback = limit;
        self
    }

    pub fn limit_transfer(&self) -> u64 {
        self.limits.transfer
    }

    pub fn limit_fallback(&self) -> u64 {
        self.limits.fallback
    }

    /// Recommended price bumped by the build multiplier, never below 1 wei
    pub fn boosted_price(&self, wei: u128) -> u128 {
        scale_by(wei, self.price_multiplier).max(1)
    }

    pub fn cancel_price(&self, wei: u128) -> u128 {
        scale_by(wei, self.cancel_multiplier).max(1)
    }
}

/// Multiplies an integer amount by a float factor with per-mille precision.
pub fn scale_by(value: u128, factor: f64) -> u128 {
    if factor <= 0.0 {
        return 0;
    }
    let per_mille = (factor * 1000.0).round() as u128;
    value.saturating_mul(per_mille) / 1000
}

/// Deserialize helper for GasConfig from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GasConfigToml {
    pub gas_price_multiplier: Option<f64>,
    pub cancel_gas_multiplier: Option<f64>,
    pub default_gas_limit: Option<u64>,
}

impl From<GasConfigToml> for GasConfig {
    fn from(toml: GasConfigToml) -> Self {
        let defaults = GasConfig::default();
        Self {
            price_multiplier: toml
                .gas_price_multiplier
                .unwrap_or(defaults.price_multiplier),
            cancel_multiplier: toml
                .cancel_gas_multiplier
                .unwrap_or(defaults.cancel_multiplier),
            limits: StandardGasLimits {
                transfer: defaults.limits.transfer,
                fallback: toml.default_gas_limit.unwrap_or(defaults.limits.fallback),
            },
        }
    }
}
