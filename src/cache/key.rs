//! Cache key derivation
//!
//! Keys are SHA-256 over the ordered tuple (query, asset symbol, timeframe)
//! after trimming and lowercasing, so equivalent requests share a key.
//! Each part is length-prefixed before hashing; "ab"+"c" and "a"+"bc"
//! never feed the hasher the same bytes.

use crate::models::Timeframe;
use sha2::{Digest, Sha256};

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Stable, collision-resistant key for an end-to-end analysis
pub fn derive_cache_key(query: &str, asset_symbol: &str, timeframe: Timeframe) -> String {
    let query = normalize(query);
    let asset_symbol = normalize(asset_symbol);

    let mut hasher = Sha256::new();
    for part in [query.as_str(), asset_symbol.as_str(), timeframe.as_str()] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_ignores_case_and_whitespace() {
        let a = derive_cache_key("Should I buy Bitcoin?", "BTC", Timeframe::Short);
        let b = derive_cache_key("  should i buy bitcoin?\n", " btc ", Timeframe::Short);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_key_depends_on_every_part() {
        let base = derive_cache_key("outlook", "BTC", Timeframe::Short);
        assert_ne!(base, derive_cache_key("outlook", "ETH", Timeframe::Short));
        assert_ne!(base, derive_cache_key("outlook", "BTC", Timeframe::Long));
        assert_ne!(base, derive_cache_key("outlook?", "BTC", Timeframe::Short));
    }

    #[test]
    fn test_part_boundaries_are_unambiguous() {
        assert_ne!(
            derive_cache_key("ab", "c", Timeframe::Medium),
            derive_cache_key("a", "bc", Timeframe::Medium)
        );
    }

    #[test]
    fn test_no_collisions_across_many_requests() {
        let assets = ["BTC", "ETH", "EUR/USD", "AAPL", "GOLD"];
        let timeframes = [Timeframe::Short, Timeframe::Medium, Timeframe::Long];
        let mut keys = HashSet::new();
        let mut total = 0;

        for i in 0..100 {
            let query = format!("what is the outlook for scenario {}", i);
            for asset in assets {
                for timeframe in timeframes {
                    keys.insert(derive_cache_key(&query, asset, timeframe));
                    total += 1;
                }
            }
        }

        assert_eq!(total, 1500);
        assert_eq!(keys.len(), total);
    }
}
