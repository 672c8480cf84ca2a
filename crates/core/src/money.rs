//! Monetary arithmetic helpers.
//!
//! All amounts are integer paise (1 INR = 100 paise), so every value is
//! already at currency precision and no floating point enters the
//! settlement path. Percentages are expressed in basis points.

/// Basis points denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// 1 INR in paise.
pub const INR_ONE: i64 = 100;

/// Default payment gateway charge (200 BPS = 2%).
pub const DEFAULT_GATEWAY_CHARGE_BPS: u32 = 200;

/// Default withdrawal charge (1000 BPS = 10%).
pub const DEFAULT_WITHDRAWAL_CHARGE_BPS: u32 = 1_000;

/// Compute a percentage fee on an amount, in basis points.
///
/// Rounds down to the paisa. Negative amounts yield a zero fee.
pub fn fee_bps(amount: i64, bps: u32) -> i64 {
    if amount <= 0 {
        return 0;
    }
    let fee = (amount as u128).saturating_mul(bps as u128) / BPS_DENOMINATOR as u128;
    fee.min(i64::MAX as u128) as i64
}

/// Proportional share of a pool: `units * pool / total_units`.
///
/// Division is performed in `u128` so rounding happens only at the
/// final amount. Returns 0 when `total_units` is 0.
pub fn pool_share(pool: i64, units: u64, total_units: u64) -> i64 {
    if total_units == 0 || units == 0 || pool <= 0 {
        return 0;
    }
    let share = (pool as u128).saturating_mul(units as u128) / total_units as u128;
    share.min(i64::MAX as u128) as i64
}

/// Render paise as a decimal rupee string, e.g. `12345` -> `"123.45"`.
pub fn format_rupees(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
