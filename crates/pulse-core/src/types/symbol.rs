//! 거래 심볼 정의.
//!
//! 심볼은 기준 자산과 호가 자산의 쌍입니다. 예: BTC/USDT.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 거래 가능한 상품을 나타내는 심볼.
///
/// 기준 자산(base)과 호가 자산(quote)으로 구성되며,
/// 파싱 시 대문자로 정규화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// 기준 자산 (예: BTC)
    pub base: String,
    /// 호가 자산 (예: USDT)
    pub quote: String,
}

impl Symbol {
    /// 새 심볼을 생성합니다.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// "BASE/QUOTE" 형식 문자열에서 심볼을 파싱합니다.
    ///
    /// # Returns
    ///
    /// base 또는 quote가 비어 있거나 구분자가 없으면 `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let (base, quote) = s.split_once('/')?;
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some(Self::new(base, quote))
    }

    /// 구분자 없는 결합 형식을 반환합니다 (예: "BTCUSDT").
    pub fn joined(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// 임의 구분자로 결합한 형식을 반환합니다 (예: "BTC-USDT").
    pub fn joined_with(&self, sep: char) -> String {
        format!("{}{}{}", self.base, sep, self.quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let symbol = Symbol::parse("btc/usdt").unwrap();
        assert_eq!(symbol.base, "BTC");
        assert_eq!(symbol.quote, "USDT");
        assert_eq!(symbol.to_string(), "BTC/USDT");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Symbol::parse("BTCUSDT").is_none());
        assert!(Symbol::parse("/USDT").is_none());
        assert!(Symbol::parse("BTC/").is_none());
    }

    #[test]
    fn test_joined_formats() {
        let symbol = Symbol::new("ETH", "USDT");
        assert_eq!(symbol.joined(), "ETHUSDT");
        assert_eq!(symbol.joined_with('-'), "ETH-USDT");
    }
}
