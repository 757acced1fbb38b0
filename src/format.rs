use crate::abi::{
    Address,
    TxHash,
};

pub const ETHER_DECIMALS: u32 = 18;
pub const PPM_DENOMINATOR: u32 = 1_000_000;

pub fn format_ether(wei: u128) -> String {
    format!("{} ETH", format_units(wei, ETHER_DECIMALS))
}

pub fn format_units(amount: u128, decimal_places: u32) -> String {
    let one_unit = 10u128.saturating_pow(decimal_places);
    let whole = amount / one_unit;
    let fractional = amount % one_unit;
    if fractional == 0 {
        format!("{whole}")
    } else {
        let padded = format!("{:0width$}", fractional, width = decimal_places as usize);
        format!("{whole}.{}", padded.trim_end_matches('0'))
    }
}

/// Parses a decimal ether amount such as `0.05` into wei.
pub fn parse_ether(raw: &str) -> Option<u128> {
    let trimmed = raw.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) || fraction.len() > ETHER_DECIMALS as usize
    {
        return None;
    }
    let one = 10u128.pow(ETHER_DECIMALS);
    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().ok()?.checked_mul(one)?
    };
    let fraction_wei = if fraction.is_empty() {
        0
    } else {
        let scale = 10u128.pow(ETHER_DECIMALS - fraction.len() as u32);
        fraction.parse::<u128>().ok()? * scale
    };
    whole_wei.checked_add(fraction_wei)
}

/// `125_000` ppm renders as `12.5%`.
pub fn format_ppm_percent(ppm: u32) -> String {
    // percent = ppm / 10_000
    format!("{}%", format_units(u128::from(ppm), 4))
}

pub fn short_address(address: &Address) -> String {
    shorten(&address.to_string())
}

fn shorten(full: &str) -> String {
    if full.len() <= 14 {
        return full.to_string();
    }
    format!("{}…{}", &full[..8], &full[full.len() - 6..])
}

pub fn explorer_tx_url(explorer_base: &str, hash: &TxHash) -> String {
    let base = explorer_base.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}/tx/{hash}")
    } else {
        format!("https://{base}/tx/{hash}")
    }
}
