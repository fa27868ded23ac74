/// 1e-6 fixed-point scale for monetary values.
pub const MICROS_SCALE: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount could not be parsed: '{0}'")]
    Invalid(String),

    #[error("amount has more than 6 decimal places (ambiguous micro conversion): '{0}'")]
    TooManyDecimalPlaces(String),
}

/// Convert a decimal amount string to integer micros without floating point.
///
/// Accepts an optional sign and an optional fractional part of at most six
/// digits. Anything requiring rounding is rejected.
pub fn amount_to_micros(s: &str) -> Result<i64, AmountError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    let invalid = || AmountError::Invalid(s.to_string());

    let (negative, digits) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    };

    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(invalid());
    }
    if frac_part.len() > 6 {
        return Err(AmountError::TooManyDecimalPlaces(s.to_string()));
    }

    let int_val: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    let frac_val: i64 = if frac_part.is_empty() {
        0
    } else {
        format!("{frac_part:0<6}").parse().map_err(|_| invalid())?
    };

    let micros = int_val
        .checked_mul(MICROS_SCALE)
        .and_then(|v| v.checked_add(frac_val))
        .ok_or_else(invalid)?;

    Ok(if negative { -micros } else { micros })
}

/// Display-only conversion. Never feed the result back into risk math.
pub fn micros_to_f64(micros: i64) -> f64 {
    micros as f64 / MICROS_SCALE as f64
}
