/// Parse a ledger amount written with `,` decimals and `.` thousands, such as
/// `"1.500,00"` or `"-12,5"`.
///
/// A `.` is only ever a thousands separator, so it must split the integer
/// part into groups of three digits; `"1.500"` is fifteen hundred and
/// `"1500.75"` is rejected. Returns `None` for empty, non-numeric or
/// non-finite input.
///
/// # Examples
///
/// ```
/// use etl_core::formatting::parse_amount;
///
/// assert_eq!(parse_amount("1.500,00"), Some(1500.0));
/// assert_eq!(parse_amount("500,25"),   Some(500.25));
/// assert_eq!(parse_amount("1.500"),    Some(1500.0));
/// assert_eq!(parse_amount("42.5"),     None);
/// assert_eq!(parse_amount("abc"),      None);
/// ```
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed),
    };
    let (integer, fraction) = match unsigned.split_once(',') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    if integer.contains('.') && !is_thousands_grouped(integer) {
        return None;
    }

    let mut normalised = format!("{}{}", sign, integer.replace('.', ""));
    if let Some(fraction) = fraction {
        normalised.push('.');
        normalised.push_str(fraction);
    }

    normalised.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a plain `.`-decimal number, as the artifact files store them.
///
/// ```
/// use etl_core::formatting::parse_decimal;
///
/// assert_eq!(parse_decimal("1500.75"), Some(1500.75));
/// assert_eq!(parse_decimal("1,5"),     None);
/// ```
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce an amount string to a number, mapping anything unparseable to `0`.
pub fn coerce_amount(raw: &str) -> f64 {
    parse_amount(raw).unwrap_or(0.0)
}

/// Round to two decimal places.
///
/// # Examples
///
/// ```
/// use etl_core::formatting::round2;
///
/// assert_eq!(round2(707.1067811865476), 707.11);
/// assert_eq!(round2(1000.0), 1000.0);
/// ```
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid rendering "-0.0".
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Render a number the way the artifact files store it: the shortest
/// representation that round-trips, always with a fractional part.
///
/// # Examples
///
/// ```
/// use etl_core::formatting::format_decimal;
///
/// assert_eq!(format_decimal(2000.0), "2000.0");
/// assert_eq!(format_decimal(707.11), "707.11");
/// ```
pub fn format_decimal(value: f64) -> String {
    format!("{:?}", value)
}

/// Format an amount as Brazilian reais: `.` thousands, `,` decimals.
///
/// # Examples
///
/// ```
/// use etl_core::formatting::format_brl;
///
/// assert_eq!(format_brl(1234567.891), "R$ 1.234.567,89");
/// assert_eq!(format_brl(0.0),         "R$ 0,00");
/// assert_eq!(format_brl(-9.5),        "R$ -9,50");
/// ```
pub fn format_brl(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let integer_part = cents / 100;
    let frac_part = cents % 100;

    let grouped = group_thousands(&integer_part.to_string(), '.');
    let sign = if negative && cents > 0 { "-" } else { "" };
    format!("R$ {}{},{:02}", sign, grouped, frac_part)
}

/// Canonical join key for an operator identifier.
///
/// Identifiers reach the pipeline as text from different sources with
/// inconsistent padding: surrounding whitespace, leading zeros, or a float
/// rendering such as `"123456.0"`. Numeric-looking keys are reduced to their
/// plain digit form; anything else is only trimmed.
///
/// # Examples
///
/// ```
/// use etl_core::formatting::normalize_key;
///
/// assert_eq!(normalize_key(" 0312345 "), "312345");
/// assert_eq!(normalize_key("312345.0"), "312345");
/// assert_eq!(normalize_key("ABC-1"),    "ABC-1");
/// ```
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }

    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// `true` when `integer` reads as `1.234.567`: a lead group of one to three
/// digits, then groups of exactly three.
fn is_thousands_grouped(integer: &str) -> bool {
    let mut groups = integer.split('.');
    let lead_ok = groups.next().is_some_and(|g| (1..=3).contains(&g.len()));
    lead_ok && groups.all(|g| g.len() == 3)
}

/// Insert `sep` every three digits from the right of an integer string.
fn group_thousands(s: &str, sep: char) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(sep);
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
