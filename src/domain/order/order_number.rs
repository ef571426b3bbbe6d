use chrono::{DateTime, Utc};
use rand::Rng;

/// Digits in the random suffix of an order number.
const SUFFIX_DIGITS: usize = 6;
const SUFFIX_SPACE: u32 = 1_000_000;

/// Builds human-readable order numbers: prefix, compact UTC timestamp to the
/// second, then a zero-padded random suffix (`ORD20250314093015042817`).
/// Uniqueness is finally guaranteed by the store's unique index.
#[derive(Debug, Clone)]
pub struct OrderNumberGenerator {
    prefix: String,
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn generate(&self, now: DateTime<Utc>) -> String {
        let suffix = rand::thread_rng().gen_range(0..SUFFIX_SPACE);
        format!(
            "{}{}{:0width$}",
            self.prefix,
            now.format("%Y%m%d%H%M%S"),
            suffix,
            width = SUFFIX_DIGITS
        )
    }
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self::new("ORD")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 15).unwrap();
        let number = OrderNumberGenerator::default().generate(now);

        assert!(number.starts_with("ORD20250314093015"));
        assert_eq!(number.len(), 3 + 14 + SUFFIX_DIGITS);
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_custom_prefix() {
        let number = OrderNumberGenerator::new("MKT").generate(Utc::now());
        assert!(number.starts_with("MKT"));
    }

    #[test]
    fn test_rapid_generation_is_mostly_distinct() {
        let generator = OrderNumberGenerator::default();
        let now = Utc::now();
        let numbers: HashSet<String> = (0..200).map(|_| generator.generate(now)).collect();
        // Same second for all 200; collisions are possible but rare and are
        // resolved by the store-level retry.
        assert!(numbers.len() >= 195);
    }
}
