//! 잔고 타입.

use crate::types::Quantity;
use serde::{Deserialize, Serialize};

/// 단일 자산의 잔고 정보.
///
/// 잔고는 의사결정 시점에 항상 거래소에서 실시간으로 조회하며,
/// 확인-후-실행 경계를 넘어 캐시하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    /// 자산 이름 (예: "BTC", "USDT")
    pub asset: String,
    /// 사용 가능한 잔고
    pub free: Quantity,
    /// 주문에 묶인 잔고
    pub locked: Quantity,
}

impl Balance {
    /// 총 잔고 반환 (사용 가능 + 묶인 잔고).
    pub fn total(&self) -> Quantity {
        self.free + self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total() {
        let balance = Balance {
            asset: "USDT".to_string(),
            free: dec!(100),
            locked: dec!(25),
        };
        assert_eq!(balance.total(), dec!(125));
    }
}
