//! Report formatter - pure text rendering of windowed aggregates
//!
//! No I/O and no state. Base-unit integers are scaled to human decimals by
//! dividing by 10^18 and rounding half-up to 2 fractional digits; trailing
//! zeros are trimmed, so 3.5 tokens render as "3.5", not "3.50".

use crate::aggregate::AggregateWindow;
use chrono::{DateTime, Utc};
use num_bigint::BigUint;

/// Fixed token decimal count; both the token and the base currency use
/// 18 base-unit decimals.
const TOKEN_DECIMALS: u32 = 18;

/// Everything a report needs besides the clock.
pub struct ReportInputs<'a> {
    pub window: &'a AggregateWindow,
    pub balance: &'a BigUint,
    pub wallet_address: &'a str,
    pub first_tx: Option<DateTime<Utc>>,
    pub last_tx: Option<DateTime<Utc>>,
    pub token_symbol: &'a str,
    pub base_symbol: &'a str,
}

/// Scale a base-unit amount to a display decimal.
///
/// Rounds half-up at the second fractional digit, then trims trailing
/// zeros and a bare trailing point.
pub fn base_units_to_display(amount: &BigUint) -> String {
    let step = BigUint::from(10u64.pow(TOKEN_DECIMALS - 2));
    let half = &step / 2u32;
    let hundredths = (amount + half) / step;

    let mut digits = hundredths.to_str_radix(10);
    while digits.len() < 3 {
        digits.insert(0, '0');
    }

    let split = digits.len() - 2;
    let int_part = &digits[..split];
    let frac_part = digits[split..].trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Human-readable elapsed time, e.g. "3h12m ago". `None` renders "n/a".
pub fn time_ago(event_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(event_time) = event_time else {
        return "n/a".to_string();
    };

    let elapsed = (now - event_time).num_seconds().max(0);
    let hours = elapsed / 3600;
    let minutes = (elapsed % 3600) / 60;
    format!("{}h{}m ago", hours, minutes)
}

/// Render one report message.
pub fn format_report(inputs: &ReportInputs<'_>, now: DateTime<Utc>) -> String {
    let window = inputs.window;

    format!(
        "Daily ${token} Stats:\n\
         - First TX: {first_tx}\n\
         - Last TX: {last_tx}\n\
         - {token} processed: {input}\n\
         - {token} distributed: {distributed}\n\
         - {base} bought: {swapped}\n\
         - {base} distributed: {dist_base}\n\
         \n\
         Distributor wallet: {wallet}\n\
         Distributor balance: {balance} {base}",
        token = inputs.token_symbol,
        base = inputs.base_symbol,
        first_tx = time_ago(inputs.first_tx, now),
        last_tx = time_ago(inputs.last_tx, now),
        input = base_units_to_display(&window.input_token_total),
        distributed = base_units_to_display(&window.distributed_token_total),
        swapped = base_units_to_display(&window.swapped_base_total),
        dist_base = base_units_to_display(&window.distributed_base_total),
        wallet = inputs.wallet_address,
        balance = base_units_to_display(inputs.balance),
    )
}
