use crate::{AccountState, AccountStatus, TierLimits};

/// What the evaluator decided for this balance change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalOutcome {
    /// Nothing tripped; account unchanged.
    NoChange,
    /// Balance fell to or through the drawdown floor. Terminal.
    Failed,
    /// Profit target and minimum trading days both satisfied.
    Passed,
    /// Daily loss limit reached: the sticky flag is now set. Status does
    /// not change; new orders are blocked by the validator until rollover.
    DailyLossTripped,
    /// Account is not in an evaluable status (already terminal, pending,
    /// or suspended); evaluation is a no-op.
    NotEvaluable,
}

/// Evaluator decision plus its evidence. `reason` is the human-readable
/// string persisted and surfaced by callers; the evaluator never logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalDecision {
    pub outcome: EvalOutcome,
    pub reason: Option<&'static str>,
}

impl EvalDecision {
    fn of(outcome: EvalOutcome) -> Self {
        Self {
            outcome,
            reason: None,
        }
    }

    pub fn status_changed(&self) -> bool {
        matches!(self.outcome, EvalOutcome::Failed | EvalOutcome::Passed)
    }
}

/// Apply the evaluation rules after any balance-affecting event.
///
/// Priority order is fixed:
/// 1. drawdown breach  -> `Failed` (terminal)
/// 2. daily loss floor -> sticky `daily_loss_limit_hit` flag
/// 3. profit target + min trading days -> `Passed`
///
/// The profit-target flag is set (freezing the trailing threshold) as soon
/// as the target is reached, even when the trading-day requirement still
/// holds the pass back.
pub fn evaluate_after_balance_change(tier: &TierLimits, st: &mut AccountState) -> EvalDecision {
    if !st.status.can_trade() {
        return EvalDecision::of(EvalOutcome::NotEvaluable);
    }

    // 1) Trailing drawdown floor. Breach is terminal: the status write here
    //    is what guarantees no account keeps trading below its floor.
    if st.balance_micros <= st.drawdown_threshold_micros {
        st.status = AccountStatus::Failed;
        return EvalDecision {
            outcome: EvalOutcome::Failed,
            reason: Some("max drawdown exceeded"),
        };
    }

    // 2) Daily loss floor: sets the sticky flag only. Submission of new
    //    orders is refused by the validator while the flag is up.
    if st.daily_pnl_micros <= -tier.daily_loss_limit_micros && !st.daily_loss_limit_hit {
        st.daily_loss_limit_hit = true;
        return EvalDecision {
            outcome: EvalOutcome::DailyLossTripped,
            reason: Some("daily loss limit reached"),
        };
    }

    // 3) Profit target. Reaching it freezes the trailing threshold
    //    permanently; the pass itself also needs the minimum trading days.
    let gain = st.balance_micros.saturating_sub(st.initial_balance_micros);
    if gain >= tier.profit_target_micros {
        st.profit_target_reached = true;
        if st.trading_days >= tier.min_trading_days && st.status == AccountStatus::Active {
            st.status = AccountStatus::Passed;
            return EvalDecision {
                outcome: EvalOutcome::Passed,
                reason: Some("profit target reached"),
            };
        }
    }

    EvalDecision::of(EvalOutcome::NoChange)
}

/// Trading-day rollover (end-of-day trigger, driven externally):
/// - raise the high-water mark and recompute the trailing floor while the
///   profit target is unreached; once reached, the floor stays frozen
/// - count a trading day if the account traded
/// - reset daily PnL and clear the daily-loss flag
///
/// May itself complete a pass: an account that reached its target earlier
/// in the day and just earned its final required trading day passes here.
pub fn roll_trading_day(tier: &TierLimits, st: &mut AccountState) -> EvalDecision {
    if st.status.is_terminal() {
        return EvalDecision::of(EvalOutcome::NotEvaluable);
    }

    if !st.profit_target_reached && st.balance_micros > st.high_water_mark_micros {
        st.high_water_mark_micros = st.balance_micros;
        st.drawdown_threshold_micros = st
            .high_water_mark_micros
            .saturating_sub(tier.max_drawdown_micros);
    }

    if st.traded_today {
        st.trading_days = st.trading_days.saturating_add(1);
        st.traded_today = false;
    }

    st.daily_pnl_micros = 0;
    st.daily_loss_limit_hit = false;

    if st.profit_target_reached
        && st.trading_days >= tier.min_trading_days
        && st.status == AccountStatus::Active
    {
        st.status = AccountStatus::Passed;
        return EvalDecision {
            outcome: EvalOutcome::Passed,
            reason: Some("profit target reached"),
        };
    }

    EvalDecision::of(EvalOutcome::NoChange)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

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

    fn active() -> AccountState {
        let mut st = AccountState::new(&tier());
        st.activate().unwrap();
        st
    }

    #[test]
    fn drop_below_floor_fails_with_reason() {
        // $50,000 account, $2,500 max drawdown => floor at $47,500.
        let t = tier();
        let mut st = active();
        st.balance_micros = 47_400_000_000;
        let d = evaluate_after_balance_change(&t, &mut st);
        assert_eq!(d.outcome, EvalOutcome::Failed);
        assert_eq!(d.reason, Some("max drawdown exceeded"));
        assert_eq!(st.status, AccountStatus::Failed);
    }

    #[test]
    fn exact_floor_fails_too() {
        let t = tier();
        let mut st = active();
        st.balance_micros = st.drawdown_threshold_micros;
        let d = evaluate_after_balance_change(&t, &mut st);
        assert_eq!(d.outcome, EvalOutcome::Failed);
    }

    #[test]
    fn failed_account_is_not_reevaluated() {
        let t = tier();
        let mut st = active();
        st.balance_micros = 47_000_000_000;
        evaluate_after_balance_change(&t, &mut st);
        assert_eq!(st.status, AccountStatus::Failed);
        // A later (buggy) balance write must not resurrect the account.
        st.balance_micros = 60_000_000_000;
        let d = evaluate_after_balance_change(&t, &mut st);
        assert_eq!(d.outcome, EvalOutcome::NotEvaluable);
        assert_eq!(st.status, AccountStatus::Failed);
    }

    #[test]
    fn daily_loss_at_exact_limit_sets_flag_without_status_change() {
        let t = tier();
        let mut st = active();
        st.daily_pnl_micros = -t.daily_loss_limit_micros;
        let d = evaluate_after_balance_change(&t, &mut st);
        assert_eq!(d.outcome, EvalOutcome::DailyLossTripped);
        assert!(st.daily_loss_limit_hit);
        assert_eq!(st.status, AccountStatus::Active);
    }

    #[test]
    fn daily_loss_flag_reported_once() {
        let t = tier();
        let mut st = active();
        st.daily_pnl_micros = -t.daily_loss_limit_micros - 50_000_000;
        assert_eq!(
            evaluate_after_balance_change(&t, &mut st).outcome,
            EvalOutcome::DailyLossTripped
        );
        // Second evaluation with the flag already set: no new trip event.
        assert_eq!(
            evaluate_after_balance_change(&t, &mut st).outcome,
            EvalOutcome::NoChange
        );
    }

    #[test]
    fn drawdown_outranks_daily_loss() {
        let t = tier();
        let mut st = active();
        st.balance_micros = 47_000_000_000;
        st.daily_pnl_micros = -3_000_000_000;
        let d = evaluate_after_balance_change(&t, &mut st);
        assert_eq!(d.outcome, EvalOutcome::Failed);
        assert!(!st.daily_loss_limit_hit, "failure preempts the flag");
    }

    #[test]
    fn profit_target_needs_min_trading_days() {
        let t = tier();
        let mut st = active();
        st.balance_micros = 53_100_000_000;
        st.trading_days = 1; // needs 2
        let d = evaluate_after_balance_change(&t, &mut st);
        assert_eq!(d.outcome, EvalOutcome::NoChange);
        assert!(st.profit_target_reached, "flag set even before the pass");
        assert_eq!(st.status, AccountStatus::Active);

        st.trading_days = 2;
        let d = evaluate_after_balance_change(&t, &mut st);
        assert_eq!(d.outcome, EvalOutcome::Passed);
        assert_eq!(st.status, AccountStatus::Passed);
    }

    #[test]
    fn rollover_trails_the_floor_up_until_target_reached() {
        let t = tier();
        let mut st = active();
        st.balance_micros = 51_000_000_000;
        roll_trading_day(&t, &mut st);
        assert_eq!(st.high_water_mark_micros, 51_000_000_000);
        assert_eq!(st.drawdown_threshold_micros, 48_500_000_000);

        // Floor never moves down.
        st.balance_micros = 50_200_000_000;
        roll_trading_day(&t, &mut st);
        assert_eq!(st.high_water_mark_micros, 51_000_000_000);
        assert_eq!(st.drawdown_threshold_micros, 48_500_000_000);
    }

    #[test]
    fn threshold_frozen_after_target() {
        let t = tier();
        let mut st = active();
        st.balance_micros = 53_200_000_000;
        st.trading_days = 0;
        evaluate_after_balance_change(&t, &mut st);
        assert!(st.profit_target_reached);
        let frozen = st.drawdown_threshold_micros;

        st.balance_micros = 55_000_000_000;
        roll_trading_day(&t, &mut st);
        assert_eq!(
            st.drawdown_threshold_micros, frozen,
            "no further trailing once the target is reached"
        );
    }

    #[test]
    fn rollover_resets_daily_state_and_counts_traded_days() {
        let t = tier();
        let mut st = active();
        st.daily_pnl_micros = -t.daily_loss_limit_micros;
        st.daily_loss_limit_hit = true;
        st.traded_today = true;

        roll_trading_day(&t, &mut st);
        assert_eq!(st.daily_pnl_micros, 0);
        assert!(!st.daily_loss_limit_hit);
        assert!(!st.traded_today);
        assert_eq!(st.trading_days, 1);

        // A day without fills does not count.
        roll_trading_day(&t, &mut st);
        assert_eq!(st.trading_days, 1);
    }

    #[test]
    fn rollover_can_complete_a_pass() {
        let t = tier();
        let mut st = active();
        st.balance_micros = 53_500_000_000;
        st.profit_target_reached = true;
        st.trading_days = 1;
        st.traded_today = true;

        let d = roll_trading_day(&t, &mut st);
        assert_eq!(d.outcome, EvalOutcome::Passed);
        assert_eq!(st.status, AccountStatus::Passed);
    }
}
