//! Fixed-point price utilities

/// Oracle prices are scaled by 1e8
pub const PRICE_DECIMALS: u32 = 8;
pub const PRICE_MULTIPLIER: i64 = 100_000_000;

/// Basis point denominator
pub const BPS: u128 = 10_000;

/// Deviation of `expected` from `oracle` in basis points of the oracle price,
/// rounded down: |oracle - expected| * 10_000 / oracle
///
/// Returns None for a non-positive oracle price.
#[inline]
pub fn price_deviation_bps(oracle: i64, expected: i64) -> Option<u64> {
    if oracle <= 0 {
        return None;
    }
    let diff = (oracle as i128 - expected as i128).unsigned_abs();
    let bps = diff * BPS / (oracle as u128);
    Some(u64::try_from(bps).unwrap_or(u64::MAX))
}

/// True if the deviation strictly exceeds `max_bps` (exact, no rounding)
#[inline]
pub fn deviation_exceeds(oracle: i64, expected: i64, max_bps: u64) -> bool {
    if oracle <= 0 {
        return true;
    }
    let diff = (oracle as i128 - expected as i128).unsigned_abs();
    diff * BPS > (max_bps as u128) * (oracle as u128)
}

/// Render a 1e8-scaled price, e.g. 123_450_000 -> "1.23450000"
pub fn format_price(price: i64) -> String {
    let sign = if price < 0 { "-" } else { "" };
    let abs = (price as i128).unsigned_abs();
    let unit = PRICE_MULTIPLIER as u128;
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / unit,
        abs % unit,
        width = PRICE_DECIMALS as usize
    )
}
