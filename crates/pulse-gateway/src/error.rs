//! 주문 게이트웨이 에러 타입.

use rust_decimal::Decimal;
use thiserror::Error;

use pulse_venue::{VenueError, VenueErrorKind};

/// 주문 처리 실패 분류.
///
/// 영속화 실패는 여기 없습니다. 거래소가 이미 주문을 수락한 뒤의
/// 저장 실패는 호출자에게 에러로 보이지 않고 로그로만 남습니다.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// 해당 거래소에 활성 자격증명/어댑터 없음
    #[error("Not connected to venue '{0}'")]
    VenueNotConnected(String),

    /// 사전 잔고 검증 실패
    #[error("Insufficient balance: required {required} {asset}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: Decimal,
        available: Decimal,
    },

    /// 심볼을 거래소에서 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 거래소가 주문을 거부함
    #[error("Venue rejected order: {0}")]
    VenueRejected(String),

    /// 그 외 거래소 에러
    #[error(transparent)]
    Venue(#[from] VenueError),
}

impl GatewayError {
    /// 어댑터 확보 단계의 에러 매핑.
    pub(crate) fn from_activation(venue: &str, e: VenueError) -> Self {
        match e.kind {
            VenueErrorKind::NotConnected(_) | VenueErrorKind::Unauthorized(_) => {
                GatewayError::VenueNotConnected(venue.to_string())
            }
            _ => GatewayError::Venue(e),
        }
    }

    /// 주문 제출 단계의 에러 매핑. 거래소 측 거부만 VenueRejected로
    /// 구분합니다.
    pub(crate) fn from_submission(e: VenueError) -> Self {
        match &e.kind {
            VenueErrorKind::OrderRejected(reason) => GatewayError::VenueRejected(reason.clone()),
            VenueErrorKind::InsufficientBalance(reason) => {
                GatewayError::VenueRejected(reason.clone())
            }
            VenueErrorKind::SymbolNotFound(symbol) => GatewayError::SymbolNotFound(symbol.clone()),
            _ => GatewayError::Venue(e),
        }
    }
}
