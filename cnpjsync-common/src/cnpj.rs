//! CNPJ validation and normalization
//!
//! The 14-digit CNPJ (8-digit root + 4-digit branch + 2 check digits) is the
//! join key for every lookup path. Validation follows the Receita Federal
//! check-digit rule: two weighted sums mod 11 over the leading digits.

use crate::{Error, Result};

/// Weights for the first check digit, applied to digits 0..12
const WEIGHTS_DIGIT_1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Weights for the second check digit, applied to digits 0..13
/// (the 13th input digit is the just-computed first check digit)
const WEIGHTS_DIGIT_2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Normalize arbitrary input to a 14-character digit string.
///
/// Strips every non-digit character, left-pads with zeros when shorter than
/// 14 (common for values exported from spreadsheets, which drop leading
/// zeros), and truncates to the first 14 digits when longer.
pub fn normalize(raw: &str) -> String {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() < 14 {
        let mut padded = "0".repeat(14 - digits.len());
        padded.push_str(&digits);
        digits = padded;
    } else if digits.len() > 14 {
        digits.truncate(14);
    }

    digits
}

/// Normalize arbitrary input to the 8-digit CNPJ root used for prefix lookups.
pub fn normalize_root(raw: &str) -> String {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() < 8 {
        let mut padded = "0".repeat(8 - digits.len());
        padded.push_str(&digits);
        digits = padded;
    } else if digits.len() > 8 {
        digits.truncate(8);
    }

    digits
}

/// Validate a CNPJ, returning its normalized 14-digit form.
///
/// Rejects the ten repeated-digit sentinels (`00000000000000` ..
/// `99999999999999`) and any value whose two trailing digits do not match
/// the computed check digits. Pure and deterministic; validating an
/// already-valid CNPJ returns it unchanged.
pub fn validate(raw: &str) -> Result<String> {
    let cnpj = normalize(raw);

    let digits: Vec<u32> = cnpj.chars().filter_map(|c| c.to_digit(10)).collect();
    debug_assert_eq!(digits.len(), 14);

    // Repeated-digit sentinels pass the check-digit rule but are not
    // assignable CNPJs
    if digits.iter().all(|&d| d == digits[0]) {
        return Err(Error::Validation(format!("{} is invalid", format_cnpj(&cnpj))));
    }

    let digit_1 = check_digit(&digits[..12], &WEIGHTS_DIGIT_1);

    let mut with_digit_1: Vec<u32> = digits[..12].to_vec();
    with_digit_1.push(digit_1);
    let digit_2 = check_digit(&with_digit_1, &WEIGHTS_DIGIT_2);

    if digits[12] != digit_1 || digits[13] != digit_2 {
        return Err(Error::Validation(format!("{} is invalid", format_cnpj(&cnpj))));
    }

    Ok(cnpj)
}

/// Weighted sum mod 11: digit is 0 when the remainder is below 2,
/// otherwise 11 minus the remainder.
fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// Display form `NN.NNN.NNN/NNNN-NN` for a normalized 14-digit CNPJ.
pub fn format_cnpj(cnpj: &str) -> String {
    if cnpj.len() != 14 {
        return cnpj.to_string();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &cnpj[0..2],
        &cnpj[2..5],
        &cnpj[5..8],
        &cnpj[8..12],
        &cnpj[12..14]
    )
}
