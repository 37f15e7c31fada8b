/// Format a float as a dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }

    if val < 0.0 {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// Estimated values are optional on bids; blank when unknown.
pub fn money_opt(val: Option<f64>) -> String {
    val.map(money).unwrap_or_default()
}

pub fn days(val: Option<i64>) -> String {
    match val {
        Some(1) => "1 day".to_string(),
        Some(n) => format!("{n} days"),
        None => String::new(),
    }
}
