/// Evaluation rules for one tier, as the risk logic needs them. The engine
/// maps its configuration layer into this struct; this crate stays
/// dependency-free.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierLimits {
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
    /// Worst-case adverse move assumed by the validator, in ticks.
    pub worst_case_ticks: i64,
}

/// The slice of an instrument specification the risk checks need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractSpec {
    pub tick_value_micros: i64,
    pub margin_per_contract_micros: i64,
}

// ---------------------------------------------------------------------------
// AccountStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an evaluation account.
///
/// Transitions flow `PendingActivation → Active → {Passed, Funded, Failed,
/// Suspended, Expired}`; `Failed` and `Expired` are terminal. Status writes
/// happen only through the methods on [`AccountState`] — there is no other
/// mutation path, so an account can never trade on from a breached state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccountStatus {
    PendingActivation,
    Active,
    Passed,
    Funded,
    Failed,
    Suspended,
    Expired,
}

impl AccountStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Expired)
    }

    /// Only active accounts may submit orders.
    pub fn can_trade(&self) -> bool {
        matches!(self, Self::Active | Self::Funded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingActivation => "pending_activation",
            Self::Active => "active",
            Self::Passed => "passed",
            Self::Funded => "funded",
            Self::Failed => "failed",
            Self::Suspended => "suspended",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_activation" => Some(Self::PendingActivation),
            "active" => Some(Self::Active),
            "passed" => Some(Self::Passed),
            "funded" => Some(Self::Funded),
            "failed" => Some(Self::Failed),
            "suspended" => Some(Self::Suspended),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Returned when a status transition is not legal from the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    pub from: AccountStatus,
    pub to: AccountStatus,
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal account transition: {} -> {}",
            self.from.as_str(),
            self.to.as_str()
        )
    }
}

impl std::error::Error for StatusError {}

// ---------------------------------------------------------------------------
// AccountState
// ---------------------------------------------------------------------------

/// Mutable risk state of one evaluation account.
///
/// Invariant: while the profit target is unreached,
/// `drawdown_threshold_micros == high_water_mark_micros - max_drawdown`;
/// once reached, the threshold is frozen and no longer trails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountState {
    pub balance_micros: i64,
    pub initial_balance_micros: i64,
    pub high_water_mark_micros: i64,
    pub drawdown_threshold_micros: i64,
    pub daily_pnl_micros: i64,
    pub daily_loss_limit_hit: bool,
    pub profit_target_reached: bool,
    /// Completed trading days on which at least one fill happened.
    pub trading_days: u32,
    /// Set by the fill path; consumed and cleared by the day rollover.
    pub traded_today: bool,
    pub status: AccountStatus,
}

impl AccountState {
    /// Fresh account in `PendingActivation`, funded at the tier's initial
    /// balance with the initial (trailing) drawdown floor.
    pub fn new(tier: &TierLimits) -> Self {
        Self {
            balance_micros: tier.initial_balance_micros,
            initial_balance_micros: tier.initial_balance_micros,
            high_water_mark_micros: tier.initial_balance_micros,
            drawdown_threshold_micros: tier
                .initial_balance_micros
                .saturating_sub(tier.max_drawdown_micros),
            daily_pnl_micros: 0,
            daily_loss_limit_hit: false,
            profit_target_reached: false,
            trading_days: 0,
            traded_today: false,
            status: AccountStatus::PendingActivation,
        }
    }

    pub fn activate(&mut self) -> Result<(), StatusError> {
        self.transition(AccountStatus::Active, |from| {
            matches!(from, AccountStatus::PendingActivation | AccountStatus::Suspended)
        })
    }

    pub fn suspend(&mut self) -> Result<(), StatusError> {
        self.transition(AccountStatus::Suspended, |from| {
            matches!(from, AccountStatus::Active)
        })
    }

    pub fn expire(&mut self) -> Result<(), StatusError> {
        self.transition(AccountStatus::Expired, |from| {
            matches!(
                from,
                AccountStatus::PendingActivation | AccountStatus::Active | AccountStatus::Suspended
            )
        })
    }

    /// Promotion of a passed evaluation into a funded account. Triggered
    /// externally (billing/back office), never by the evaluator itself.
    pub fn fund(&mut self) -> Result<(), StatusError> {
        self.transition(AccountStatus::Funded, |from| {
            matches!(from, AccountStatus::Passed)
        })
    }

    fn transition(
        &mut self,
        to: AccountStatus,
        legal_from: impl Fn(AccountStatus) -> bool,
    ) -> Result<(), StatusError> {
        if !legal_from(self.status) {
            return Err(StatusError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Current drawdown: decline from the high-water mark. Never negative.
    pub fn drawdown_micros(&self) -> i64 {
        (self.high_water_mark_micros - self.balance_micros).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn tier_50k() -> TierLimits {
        TierLimits {
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
        }
    }

    #[test]
    fn new_account_has_trailing_floor_below_initial_balance() {
        let st = AccountState::new(&tier_50k());
        assert_eq!(st.status, AccountStatus::PendingActivation);
        assert_eq!(st.drawdown_threshold_micros, 47_500_000_000);
        assert_eq!(st.drawdown_micros(), 0);
    }

    #[test]
    fn activation_and_suspension_round_trip() {
        let mut st = AccountState::new(&tier_50k());
        st.activate().unwrap();
        st.suspend().unwrap();
        st.activate().unwrap();
        assert_eq!(st.status, AccountStatus::Active);
    }

    #[test]
    fn illegal_transitions_are_typed_errors() {
        let mut st = AccountState::new(&tier_50k());
        let err = st.fund().unwrap_err();
        assert_eq!(err.from, AccountStatus::PendingActivation);
        assert_eq!(err.to, AccountStatus::Funded);
        // State unchanged after the error.
        assert_eq!(st.status, AccountStatus::PendingActivation);
    }

    #[test]
    fn failed_is_terminal() {
        assert!(AccountStatus::Failed.is_terminal());
        assert!(!AccountStatus::Failed.can_trade());
        let mut st = AccountState::new(&tier_50k());
        st.activate().unwrap();
        st.status = AccountStatus::Failed;
        assert!(st.activate().is_err());
    }

    #[test]
    fn status_string_round_trip() {
        for s in [
            AccountStatus::PendingActivation,
            AccountStatus::Active,
            AccountStatus::Passed,
            AccountStatus::Funded,
            AccountStatus::Failed,
            AccountStatus::Suspended,
            AccountStatus::Expired,
        ] {
            assert_eq!(AccountStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(AccountStatus::parse("nope"), None);
    }
}
