//! 거래소별 커넥터 구현.
//!
//! 각 커넥터는 거래소의 원시 응답을 내부 타입으로 완전히 정규화합니다.
//! 원시 형식은 이 모듈 밖으로 나가지 않습니다.

mod binance;
mod okx;

pub use binance::{BinanceAdapter, BinanceConfig};
pub use okx::{OkxAdapter, OkxConfig};

use std::sync::Arc;

use pulse_core::VenueKeys;

use crate::adapter::VenueAdapter;
use crate::error::{VenueError, VenueErrorKind};

/// 거래소 이름으로 어댑터를 생성합니다.
///
/// `keys`가 `None`이면 공개 데이터 전용 익명 어댑터가 생성됩니다.
///
/// # Errors
///
/// 알 수 없는 거래소 이름이면 `NotConnected`를 반환합니다.
pub fn build_adapter(
    venue: &str,
    keys: Option<VenueKeys>,
    timeout_secs: u64,
) -> Result<Arc<dyn VenueAdapter>, VenueError> {
    match venue {
        "binance" => {
            let config = BinanceConfig::new(keys).with_timeout(timeout_secs);
            Ok(Arc::new(BinanceAdapter::new(config)?))
        }
        "okx" => {
            let config = OkxConfig::new(keys).with_timeout(timeout_secs);
            Ok(Arc::new(OkxAdapter::new(config)?))
        }
        other => Err(VenueError::new(
            other,
            VenueErrorKind::NotConnected(format!("unknown venue: {}", other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_known_venues() {
        assert!(build_adapter("binance", None, 30).is_ok());
        assert!(build_adapter("okx", None, 30).is_ok());
    }

    #[test]
    fn test_build_unknown_venue() {
        let err = build_adapter("krakenx", None, 30).err().unwrap();
        assert!(matches!(err.kind, VenueErrorKind::NotConnected(_)));
    }
}
