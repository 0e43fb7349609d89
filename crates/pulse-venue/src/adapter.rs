//! 거래소 어댑터 trait 정의.

use async_trait::async_trait;
use pulse_core::{Balance, OrderBook, OrderRequest, OrderResult, Symbol, Ticker, TradeTick};

use crate::error::VenueError;

/// 거래소 작업을 위한 Result 타입.
pub type VenueResult<T> = Result<T, VenueError>;

/// 통합 거래소 인터페이스.
///
/// 모든 작업은 정규화된 결과를 반환하거나 거래소 이름이 태깅된
/// `VenueError`로 실패합니다. 어댑터는 누락된 필수 필드를 합성 값으로
/// 대체하지 않습니다. 선택적 수치 필드(24시간 최고/최저가 등)만 부재 시
/// 0으로 기본 처리됩니다.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    /// 거래 가능한 마켓(심볼) 목록 로드.
    ///
    /// 어댑터 활성화 시 한 번 호출되어 심볼 검증에 사용됩니다.
    async fn load_markets(&self) -> VenueResult<Vec<Symbol>>;

    /// 단일 심볼의 24시간 시세 조회.
    async fn fetch_ticker(&self, symbol: &Symbol) -> VenueResult<Ticker>;

    /// 전체 마켓의 24시간 시세 일괄 조회.
    async fn fetch_tickers(&self) -> VenueResult<Vec<Ticker>>;

    /// 심볼의 호가창 조회.
    async fn fetch_order_book(&self, symbol: &Symbol, depth: u32) -> VenueResult<OrderBook>;

    /// 심볼의 최근 체결 조회.
    async fn fetch_trades(&self, symbol: &Symbol, limit: u32) -> VenueResult<Vec<TradeTick>>;

    /// 계좌의 전체 잔고 조회 (인증 필요).
    ///
    /// 잔고가 0이 아닌 자산만 반환합니다.
    async fn fetch_balance(&self) -> VenueResult<Vec<Balance>>;

    /// 새 주문 제출 (인증 필요).
    ///
    /// 거래소가 수락을 확인한 경우에만 `OrderResult`가 생성됩니다.
    async fn place_order(&self, request: &OrderRequest) -> VenueResult<OrderResult>;

    /// 주문 취소 (인증 필요).
    async fn cancel_order(&self, order_id: &str, symbol: &Symbol) -> VenueResult<()>;
}
