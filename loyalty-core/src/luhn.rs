//! Order number well-formedness (Luhn checksum).

use crate::{CoreError, CoreResult};

/// True when `number` is a non-empty run of ASCII digits with a valid Luhn checksum.
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = number
        .bytes()
        .rev()
        .map(|b| u32::from(b - b'0'))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Normalizes a submitted order number: trims whitespace, requires digits, then the checksum.
pub fn parse_order_number(raw: &str) -> CoreResult<String> {
    let number = raw.trim();
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::ValidationError(format!("order number must be digits: {:?}", number)));
    }
    if !is_valid(number) {
        return Err(CoreError::ChecksumError(number.to_string()));
    }
    Ok(number.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_valid_numbers() {
        assert!(is_valid("79927398713"));
        assert!(is_valid("12345678903"));
        assert!(is_valid("2377225624"));
        assert!(is_valid("0"));
    }

    #[test]
    fn test_rejects_bad_checksum_and_garbage() {
        assert!(!is_valid("79927398710"));
        assert!(!is_valid("12345678901"));
        assert!(!is_valid(""));
        assert!(!is_valid("7992-7398713"));
        assert!(!is_valid("abc"));
    }

    #[test]
    fn test_parse_distinguishes_format_from_checksum() {
        assert_eq!(parse_order_number(" 79927398713\n").unwrap(), "79927398713");
        assert!(matches!(parse_order_number("12ab"), Err(CoreError::ValidationError(_))));
        assert!(matches!(parse_order_number("79927398710"), Err(CoreError::ChecksumError(_))));
    }
}
