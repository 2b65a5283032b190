use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Static contract specification for one instrument symbol. Immutable once
/// loaded; the engine never writes these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Minimum price increment, in micros. Every price the feed emits and
    /// every fill price is a multiple of this.
    pub tick_size_micros: i64,
    /// Dollar value of one tick of movement per contract, in micros.
    pub tick_value_micros: i64,
    /// Typical per-tick walk amplitude, in ticks.
    pub volatility_ticks: u32,
    /// Flat per-contract margin requirement, in micros.
    pub margin_per_contract_micros: i64,
    /// Mean-reversion anchor for the synthetic walk, in micros.
    pub reference_price_micros: i64,
}

impl InstrumentSpec {
    pub fn validate(&self) -> Result<()> {
        if self.tick_size_micros <= 0 {
            bail!("tick_size_micros must be > 0");
        }
        if self.tick_value_micros <= 0 {
            bail!("tick_value_micros must be > 0");
        }
        if self.margin_per_contract_micros < 0 {
            bail!("margin_per_contract_micros must be >= 0");
        }
        if self.reference_price_micros < self.tick_size_micros {
            bail!("reference_price_micros must be at least one tick");
        }
        if self.reference_price_micros % self.tick_size_micros != 0 {
            bail!("reference_price_micros must be a multiple of tick_size_micros");
        }
        Ok(())
    }
}

/// Evaluation rules for one account tier. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRules {
    pub initial_balance_micros: i64,
    /// Trailing drawdown allowance below the high-water mark.
    pub max_drawdown_micros: i64,
    pub daily_loss_limit_micros: i64,
    pub profit_target_micros: i64,
    pub max_contracts_per_trade: i64,
    pub max_open_contracts: i64,
    pub min_trading_days: u32,
    pub commission_per_contract_micros: i64,
    pub fee_per_contract_micros: i64,
    /// Stress multiplier for the validator's worst-case adverse-move check,
    /// in ticks.
    pub worst_case_ticks: i64,
}

impl TierRules {
    pub fn validate(&self) -> Result<()> {
        if self.initial_balance_micros <= 0 {
            bail!("initial_balance_micros must be > 0");
        }
        if self.max_drawdown_micros <= 0 {
            bail!("max_drawdown_micros must be > 0");
        }
        if self.daily_loss_limit_micros <= 0 {
            bail!("daily_loss_limit_micros must be > 0");
        }
        if self.profit_target_micros <= 0 {
            bail!("profit_target_micros must be > 0");
        }
        if self.max_contracts_per_trade <= 0 || self.max_open_contracts <= 0 {
            bail!("contract limits must be > 0");
        }
        if self.commission_per_contract_micros < 0 || self.fee_per_contract_micros < 0 {
            bail!("per-contract costs must be >= 0");
        }
        if self.worst_case_ticks < 0 {
            bail!("worst_case_ticks must be >= 0");
        }
        Ok(())
    }

    /// Round-trip cost (entry + exit) for `qty` contracts, in micros.
    pub fn round_trip_cost_micros(&self, qty: i64) -> i64 {
        let per_contract =
            (self.commission_per_contract_micros + self.fee_per_contract_micros) as i128;
        let total = 2 * per_contract * qty as i128;
        total.min(i64::MAX as i128) as i64
    }
}

/// Engine-level settings (not per-tier, not per-instrument).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Cadence of the resting-order monitor, in seconds. The daemon drives
    /// the sweep; the engine never self-schedules. Price movement inside one
    /// interval is invisible to trigger checks by design.
    pub sweep_interval_secs: u64,
    /// IANA timezone whose midnight defines the trading-day rollover.
    #[serde(default = "default_session_timezone")]
    pub session_timezone: String,
    /// Ticks aggregated into one cached OHLC bar.
    pub bar_span_ticks: u32,
    /// Master seed for the per-symbol price walks.
    pub price_seed: u64,
    /// Upper bound of the baseline market-order slippage draw, in ticks.
    pub slippage_base_ticks_max: u32,
    /// Quantity step that adds one multiple of baseline slippage: effective
    /// slippage = base * (1 + qty / slippage_size_step).
    pub slippage_size_step: i64,
}

fn default_session_timezone() -> String {
    "America/New_York".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> InstrumentSpec {
        InstrumentSpec {
            tick_size_micros: 250_000,
            tick_value_micros: 1_250_000,
            volatility_ticks: 4,
            margin_per_contract_micros: 1_500_000_000,
            reference_price_micros: 5_100_000_000,
        }
    }

    #[test]
    fn valid_spec_passes() {
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn misaligned_reference_rejected() {
        let mut s = spec();
        s.reference_price_micros += 1;
        assert!(s.validate().is_err());
    }

    #[test]
    fn round_trip_cost_covers_both_legs() {
        let tier = TierRules {
            initial_balance_micros: 50_000_000_000,
            max_drawdown_micros: 2_500_000_000,
            daily_loss_limit_micros: 1_250_000_000,
            profit_target_micros: 3_000_000_000,
            max_contracts_per_trade: 5,
            max_open_contracts: 10,
            min_trading_days: 2,
            commission_per_contract_micros: 1_500_000,
            fee_per_contract_micros: 500_000,
            worst_case_ticks: 8,
        };
        // 2 legs * 3 contracts * (1.50 + 0.50)
        assert_eq!(tier.round_trip_cost_micros(3), 12_000_000);
    }
}
