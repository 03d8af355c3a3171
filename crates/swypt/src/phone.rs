const KENYA_PREFIX: &str = "254";

/// Normalizes an M-Pesa phone number to the international `254XXXXXXXXX` form.
///
/// Numbers already carrying the country code are kept, local numbers lose their leading zeros.
pub fn normalize_phone(phone: &str) -> String {
  let digits: String = phone
    .trim()
    .trim_start_matches('+')
    .chars()
    .filter(|c| !c.is_whitespace() && *c != '-')
    .collect();

  if digits.starts_with(KENYA_PREFIX) {
    return digits;
  }

  format!("{KENYA_PREFIX}{}", digits.trim_start_matches('0'))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_local_number_gets_country_code() {
    assert_eq!(normalize_phone("0712345678"), "254712345678");
  }

  #[test]
  fn test_international_number_is_kept() {
    assert_eq!(normalize_phone("254712345678"), "254712345678");
    assert_eq!(normalize_phone("+254 712 345 678"), "254712345678");
  }

  #[test]
  fn test_short_form_without_zero() {
    assert_eq!(normalize_phone("712345678"), "254712345678");
    assert_eq!(normalize_phone("00712-345-678"), "254712345678");
  }
}
