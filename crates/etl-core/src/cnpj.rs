//! CNPJ (Brazilian national company identifier) check-digit validation.
//!
//! Structural check only: a valid result says nothing about whether the
//! company exists in any registry.

/// Identifier substituted when neither the registry nor the source row
/// carries one.
pub const SENTINEL_CNPJ: &str = "00000000000000";

const FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Keep only the ASCII digits of `raw` (`"11.222.333/0001-81"` → `"11222333000181"`).
pub fn strip_non_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Modulo-11 check digit over `digits` with the matching `weights`.
fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// Validate the two trailing check digits of a CNPJ.
///
/// Non-digit characters are ignored. The identifier is rejected when it does
/// not have exactly 14 digits or when all 14 digits are the same.
pub fn is_valid(raw: &str) -> bool {
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 14 {
        return false;
    }
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    let first = check_digit(&digits[..12], &FIRST_WEIGHTS);
    let mut with_first = digits[..12].to_vec();
    with_first.push(first);
    let second = check_digit(&with_first, &SECOND_WEIGHTS);

    digits[12] == first && digits[13] == second
}
