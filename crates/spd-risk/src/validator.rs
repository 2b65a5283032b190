use crate::{AccountState, ContractSpec, TierLimits};

// ---------------------------------------------------------------------------
// Check identities and outcomes
// ---------------------------------------------------------------------------

/// The five pre-trade checks, in the order they are reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckKind {
    Balance,
    PositionLimit,
    Drawdown,
    DailyLoss,
    Margin,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::PositionLimit => "position_limit",
            Self::Drawdown => "drawdown",
            Self::DailyLoss => "daily_loss",
            Self::Margin => "margin",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// The check could not run (unknown instrument). Fail-open by design:
    /// the caller logs a warning and the remaining checks still decide.
    Skipped,
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub outcome: CheckOutcome,
    pub reason: Option<String>,
}

impl CheckResult {
    fn passed(kind: CheckKind) -> Self {
        Self {
            kind,
            outcome: CheckOutcome::Passed,
            reason: None,
        }
    }

    fn failed(kind: CheckKind, reason: String) -> Self {
        Self {
            kind,
            outcome: CheckOutcome::Failed,
            reason: Some(reason),
        }
    }

    fn skipped(kind: CheckKind, reason: String) -> Self {
        Self {
            kind,
            outcome: CheckOutcome::Skipped,
            reason: Some(reason),
        }
    }
}

/// Complete validator output: per-check diagnostics plus the joined
/// failure reasons persisted for audit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub failure_reasons: Vec<String>,
}

impl ValidationReport {
    pub fn joined_reasons(&self) -> String {
        self.failure_reasons.join("; ")
    }
}

// ---------------------------------------------------------------------------
// Snapshot input
// ---------------------------------------------------------------------------

/// Point-in-time input for one validation run. Built by the caller from the
/// account, its tier, and the (possibly unknown) instrument; validation
/// never mutates anything.
#[derive(Clone, Debug)]
pub struct ValidationSnapshot<'a> {
    pub account: &'a AccountState,
    pub tier: &'a TierLimits,
    /// `None` when the instrument has no contract specification; the
    /// drawdown and margin checks then report [`CheckOutcome::Skipped`].
    pub contract: Option<&'a ContractSpec>,
    /// Contracts currently open across the account's positions (absolute).
    pub open_contracts: i64,
    /// Requested order quantity (always positive).
    pub qty: i64,
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Run the full check battery. All five checks always run — no
/// short-circuit — so the report carries a complete diagnostic; the order
/// is accepted only if every check passed (skipped checks do not fail the
/// order).
pub fn validate(snap: &ValidationSnapshot<'_>) -> ValidationReport {
    let checks = vec![
        check_balance(snap),
        check_position_limit(snap),
        check_drawdown(snap),
        check_daily_loss(snap),
        check_margin(snap),
    ];

    let failure_reasons: Vec<String> = checks
        .iter()
        .filter(|c| c.outcome == CheckOutcome::Failed)
        .filter_map(|c| c.reason.clone())
        .collect();

    ValidationReport {
        passed: failure_reasons.is_empty(),
        checks,
        failure_reasons,
    }
}

/// Balance must cover the estimated round-trip commission for the
/// requested quantity.
fn check_balance(snap: &ValidationSnapshot<'_>) -> CheckResult {
    let per_contract = (snap.tier.commission_per_contract_micros
        + snap.tier.fee_per_contract_micros) as i128;
    let round_trip = 2 * per_contract * snap.qty as i128;

    if (snap.account.balance_micros as i128) >= round_trip {
        CheckResult::passed(CheckKind::Balance)
    } else {
        CheckResult::failed(
            CheckKind::Balance,
            format!(
                "balance {} below estimated round-trip cost {} for {} contract(s)",
                snap.account.balance_micros, round_trip, snap.qty
            ),
        )
    }
}

/// Per-trade and total open-contract limits.
fn check_position_limit(snap: &ValidationSnapshot<'_>) -> CheckResult {
    if snap.qty > snap.tier.max_contracts_per_trade {
        return CheckResult::failed(
            CheckKind::PositionLimit,
            format!(
                "quantity {} exceeds per-trade limit {}",
                snap.qty, snap.tier.max_contracts_per_trade
            ),
        );
    }
    let projected = snap.open_contracts.saturating_add(snap.qty);
    if projected > snap.tier.max_open_contracts {
        return CheckResult::failed(
            CheckKind::PositionLimit,
            format!(
                "open contracts {} + requested {} exceeds max open contracts {}",
                snap.open_contracts, snap.qty, snap.tier.max_open_contracts
            ),
        );
    }
    CheckResult::passed(CheckKind::PositionLimit)
}

/// A worst-case adverse move applied to the full requested quantity must
/// not push the balance through the drawdown floor.
fn check_drawdown(snap: &ValidationSnapshot<'_>) -> CheckResult {
    let Some(contract) = snap.contract else {
        return CheckResult::skipped(
            CheckKind::Drawdown,
            "no contract specification; drawdown stress not applied".to_string(),
        );
    };

    let worst_loss = snap.tier.worst_case_ticks as i128
        * contract.tick_value_micros as i128
        * snap.qty as i128;
    let projected = snap.account.balance_micros as i128 - worst_loss;

    if projected > snap.account.drawdown_threshold_micros as i128 {
        CheckResult::passed(CheckKind::Drawdown)
    } else {
        CheckResult::failed(
            CheckKind::Drawdown,
            format!(
                "worst-case move of {} would breach drawdown threshold {}",
                worst_loss, snap.account.drawdown_threshold_micros
            ),
        )
    }
}

/// Reject outright while the daily-loss flag is set; otherwise reject once
/// daily PnL is already at or past the negative limit.
fn check_daily_loss(snap: &ValidationSnapshot<'_>) -> CheckResult {
    if snap.account.daily_loss_limit_hit {
        return CheckResult::failed(
            CheckKind::DailyLoss,
            "daily loss limit already hit; trading blocked until next session".to_string(),
        );
    }
    let floor = -snap.tier.daily_loss_limit_micros;
    if snap.account.daily_pnl_micros <= floor {
        return CheckResult::failed(
            CheckKind::DailyLoss,
            format!(
                "daily pnl {} at or past daily loss limit {}",
                snap.account.daily_pnl_micros, snap.tier.daily_loss_limit_micros
            ),
        );
    }
    CheckResult::passed(CheckKind::DailyLoss)
}

/// Flat per-contract margin: the new quantity's requirement must fit in
/// what is left after margining the existing open contracts.
fn check_margin(snap: &ValidationSnapshot<'_>) -> CheckResult {
    let Some(contract) = snap.contract else {
        return CheckResult::skipped(
            CheckKind::Margin,
            "no contract specification; margin not checked".to_string(),
        );
    };

    let required = contract.margin_per_contract_micros as i128 * snap.qty as i128;
    let in_use = contract.margin_per_contract_micros as i128 * snap.open_contracts as i128;
    let available = snap.account.balance_micros as i128 - in_use;

    if required <= available {
        CheckResult::passed(CheckKind::Margin)
    } else {
        CheckResult::failed(
            CheckKind::Margin,
            format!("margin required {} exceeds available {}", required, available),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccountState;

    fn tier() -> TierLimits {
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

    fn contract() -> ContractSpec {
        ContractSpec {
            tick_value_micros: 1_250_000,
            margin_per_contract_micros: 1_500_000_000,
        }
    }

    fn active_account(tier: &TierLimits) -> AccountState {
        let mut st = AccountState::new(tier);
        st.activate().unwrap();
        st
    }

    fn snapshot<'a>(
        account: &'a AccountState,
        tier: &'a TierLimits,
        contract: Option<&'a ContractSpec>,
        open: i64,
        qty: i64,
    ) -> ValidationSnapshot<'a> {
        ValidationSnapshot {
            account,
            tier,
            contract,
            open_contracts: open,
            qty,
        }
    }

    #[test]
    fn healthy_account_passes_all_five() {
        let tier = tier();
        let acct = active_account(&tier);
        let c = contract();
        let report = validate(&snapshot(&acct, &tier, Some(&c), 0, 2));
        assert!(report.passed);
        assert_eq!(report.checks.len(), 5);
        assert!(report
            .checks
            .iter()
            .all(|c| c.outcome == CheckOutcome::Passed));
        assert!(report.failure_reasons.is_empty());
    }

    #[test]
    fn all_checks_run_even_after_a_failure() {
        let tier = tier();
        let mut acct = active_account(&tier);
        acct.balance_micros = 1_000_000; // fails balance AND drawdown AND margin
        let c = contract();
        let report = validate(&snapshot(&acct, &tier, Some(&c), 0, 20));
        assert!(!report.passed);
        // No short-circuit: every check reported.
        assert_eq!(report.checks.len(), 5);
        // Balance, position-limit (20 > 5), drawdown and margin all fail.
        assert!(report.failure_reasons.len() >= 3);
    }

    #[test]
    fn per_trade_limit_enforced() {
        let tier = tier();
        let acct = active_account(&tier);
        let c = contract();
        let report = validate(&snapshot(&acct, &tier, Some(&c), 0, 6));
        let pl = &report.checks[1];
        assert_eq!(pl.kind, CheckKind::PositionLimit);
        assert_eq!(pl.outcome, CheckOutcome::Failed);
    }

    #[test]
    fn open_contracts_count_toward_the_cap() {
        let tier = tier();
        let acct = active_account(&tier);
        let c = contract();
        // 8 open + 3 requested > 10 max, though 3 <= 5 per-trade.
        let report = validate(&snapshot(&acct, &tier, Some(&c), 8, 3));
        assert!(!report.passed);
        assert_eq!(report.checks[1].outcome, CheckOutcome::Failed);
    }

    #[test]
    fn drawdown_stress_rejects_near_the_floor() {
        let tier = tier();
        let mut acct = active_account(&tier);
        // 30 micros-dollars above the floor; 8 ticks * 1.25 * 3 = 30 dollars
        // of stress lands exactly on the threshold => reject.
        acct.balance_micros = acct.drawdown_threshold_micros + 30_000_000;
        let c = contract();
        let report = validate(&snapshot(&acct, &tier, Some(&c), 0, 3));
        assert_eq!(report.checks[2].kind, CheckKind::Drawdown);
        assert_eq!(report.checks[2].outcome, CheckOutcome::Failed);
    }

    #[test]
    fn daily_loss_flag_blocks_regardless_of_balance() {
        let tier = tier();
        let mut acct = active_account(&tier);
        acct.daily_loss_limit_hit = true;
        let c = contract();
        let report = validate(&snapshot(&acct, &tier, Some(&c), 0, 1));
        assert!(!report.passed);
        let dl = &report.checks[3];
        assert_eq!(dl.outcome, CheckOutcome::Failed);
        assert!(dl.reason.as_deref().unwrap().contains("already hit"));
    }

    #[test]
    fn daily_pnl_at_exact_limit_rejects() {
        let tier = tier();
        let mut acct = active_account(&tier);
        acct.daily_pnl_micros = -tier.daily_loss_limit_micros;
        let c = contract();
        let report = validate(&snapshot(&acct, &tier, Some(&c), 0, 1));
        assert_eq!(report.checks[3].outcome, CheckOutcome::Failed);
    }

    #[test]
    fn margin_accounts_for_open_contracts() {
        let tier = tier();
        let acct = active_account(&tier); // 50k balance, 1.5k margin/contract
        let c = contract();
        // 30 open contracts would use 45k margin; 5 more need 7.5k > 5k left.
        let report = validate(&snapshot(&acct, &tier, Some(&c), 30, 5));
        assert_eq!(report.checks[4].kind, CheckKind::Margin);
        assert_eq!(report.checks[4].outcome, CheckOutcome::Failed);
    }

    #[test]
    fn unknown_instrument_skips_drawdown_and_margin_only() {
        let tier = tier();
        let acct = active_account(&tier);
        let report = validate(&snapshot(&acct, &tier, None, 0, 2));
        assert!(report.passed, "skipped checks must not fail the order");
        assert_eq!(report.checks[2].outcome, CheckOutcome::Skipped);
        assert_eq!(report.checks[4].outcome, CheckOutcome::Skipped);
        assert_eq!(report.checks[0].outcome, CheckOutcome::Passed);
        assert_eq!(report.checks[1].outcome, CheckOutcome::Passed);
        assert_eq!(report.checks[3].outcome, CheckOutcome::Passed);
    }

    #[test]
    fn reasons_join_for_audit() {
        let tier = tier();
        let mut acct = active_account(&tier);
        acct.daily_loss_limit_hit = true;
        let c = contract();
        let report = validate(&snapshot(&acct, &tier, Some(&c), 0, 6));
        let joined = report.joined_reasons();
        assert!(joined.contains("per-trade limit"));
        assert!(joined.contains("daily loss limit"));
        assert!(joined.contains("; "));
    }
}
