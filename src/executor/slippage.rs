//! Slippage bound and swap deadline helpers

use alloy_primitives::U256;

/// Swap deadline horizon (10 minutes)
pub const DEADLINE_HORIZON_SECS: u64 = 600;

/// Slippage precision: parts per million (0.05% = 500 ppm)
const PPM: u64 = 1_000_000;

/// Minimum acceptable output: `quote * (1 - slippage_percent / 100)`.
///
/// Tolerance is clamped to [0, 100]% so the bound never exceeds the quote
/// and never goes negative.
pub fn min_amount_out(quote: U256, slippage_percent: f64) -> U256 {
    let tolerance_ppm = if slippage_percent.is_nan() {
        0
    } else {
        (slippage_percent.clamp(0.0, 100.0) * (PPM / 100) as f64).round() as u64
    };

    quote * U256::from(PPM - tolerance_ppm.min(PPM)) / U256::from(PPM)
}

/// Deadline for a swap built at `now` (unix seconds)
pub fn deadline_from(now: u64) -> u64 {
    now.saturating_add(DEADLINE_HORIZON_SECS)
}

/// Wall clock in unix seconds
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
