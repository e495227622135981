//! Human-facing exchange rate quotes in won.

/// Quote unit per currency: low-value currencies are quoted per 1,000 or 10,000 units so the
/// won amount never drops below one.
pub fn quote_unit(currency: &str) -> u32 {
    match currency {
        "JPY" => 1_000,
        "VND" | "IDR" => 10_000,
        _ => 1,
    }
}

/// `rate` is units of `currency` per 1 KRW, so one unit costs `1 / rate` won.
pub fn format_exchange_rate(currency: &str, rate: f64) -> String {
    let unit = quote_unit(currency);
    let won = (f64::from(unit) / rate).round();
    format!(
        "{} {currency} = {}원",
        group_thousands(i64::from(unit)),
        group_thousands(won as i64)
    )
}

/// Quote plus the Korean currency name, e.g. `1 USD = 1,333원 (달러)`.
pub fn exchange_rate_text(currency: &str, rate: f64) -> String {
    format!(
        "{} ({})",
        format_exchange_rate(currency, rate),
        currency_name(currency)
    )
}

pub fn currency_name(currency: &str) -> &str {
    match currency {
        "USD" => "달러",
        "EUR" => "유로",
        "JPY" => "엔",
        "CNY" => "위안",
        "GBP" => "파운드",
        "AUD" => "호주달러",
        "CAD" => "캐나다달러",
        "NZD" => "뉴질랜드달러",
        "THB" => "바트",
        "VND" => "동",
        "SGD" => "싱가포르달러",
        "MYR" => "링깃",
        "IDR" => "루피아",
        "PHP" => "페소",
        "TWD" => "대만달러",
        "HKD" => "홍콩달러",
        "CHF" => "스위스프랑",
        "INR" => "루피",
        "MXN" => "멕시코페소",
        "TRY" => "리라",
        other => other,
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
