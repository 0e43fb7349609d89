//! 주문 게이트웨이.
//!
//! 제출 전에 실 잔고를 확인하고, 통과한 주문만 거래소로 보냅니다.
//! 거래소 응답이 유일한 진실입니다. 거래소가 수락한 주문은 이후
//! 저장이 실패해도 체결된 것으로 취급합니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use pulse_core::{AlertRecord, Balance, OrderRequest, OrderResult, Price, Quantity, Side, Symbol};
use pulse_market::{BroadcastHub, ServerMessage};
use pulse_store::PersistenceCascade;
use pulse_venue::{VenueAdapter, VenueRegistry};

use crate::error::GatewayError;

/// 매수 주문에 필요한 호가 자산 수량.
///
/// 지정가는 지정 가격, 시장가는 추정 가격 기준입니다.
pub fn required_quote(quantity: Quantity, unit_price: Price) -> Decimal {
    quantity * unit_price
}

fn free_balance(balances: &[Balance], asset: &str) -> Decimal {
    balances
        .iter()
        .find(|b| b.asset == asset)
        .map(|b| b.free)
        .unwrap_or(Decimal::ZERO)
}

/// 주문 게이트웨이.
pub struct OrderGateway {
    registry: Arc<VenueRegistry>,
    cascade: Arc<PersistenceCascade>,
    hub: Arc<BroadcastHub>,
}

impl OrderGateway {
    pub fn new(
        registry: Arc<VenueRegistry>,
        cascade: Arc<PersistenceCascade>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            registry,
            cascade,
            hub,
        }
    }

    /// 주문 제출.
    ///
    /// 1. 사용자의 인증 어댑터 확보
    /// 2. 실 잔고 조회
    /// 3. 방향별 잔고 충분성 검증
    /// 4. 통과 시 거래소 제출, 응답을 그대로 반환
    /// 5. 결과/알림은 베스트에포트로 저장하고 당사자에게 실시간 통지
    pub async fn place_order(
        &self,
        user_id: &str,
        venue: &str,
        request: OrderRequest,
    ) -> Result<OrderResult, GatewayError> {
        let adapter = self
            .registry
            .for_user(user_id, venue)
            .await
            .map_err(|e| GatewayError::from_activation(venue, e))?;

        let balances = adapter.fetch_balance().await.map_err(GatewayError::Venue)?;
        self.verify_balance(&adapter, &request, &balances).await?;

        let result = match adapter.place_order(&request).await {
            Ok(result) => result,
            Err(e) => {
                let gateway_error = GatewayError::from_submission(e);
                self.record_failure(user_id, venue, &request, &gateway_error)
                    .await;
                return Err(gateway_error);
            }
        };

        info!(
            "Order accepted by {}: {} {} {} (id {})",
            venue, result.side, result.quantity, result.symbol, result.venue_order_id
        );

        self.record_success(user_id, &result).await;
        self.hub
            .notify_user(user_id, ServerMessage::OrderExecuted {
                order: result.clone(),
            })
            .await;

        Ok(result)
    }

    /// 주문 취소 (거래소로 그대로 전달).
    pub async fn cancel_order(
        &self,
        user_id: &str,
        venue: &str,
        order_id: &str,
        symbol: &Symbol,
    ) -> Result<(), GatewayError> {
        let adapter = self
            .registry
            .for_user(user_id, venue)
            .await
            .map_err(|e| GatewayError::from_activation(venue, e))?;

        adapter
            .cancel_order(order_id, symbol)
            .await
            .map_err(GatewayError::from_submission)
    }

    /// 방향별 사전 잔고 검증. 시장가 매수는 현재가로 필요액을
    /// 추정합니다.
    async fn verify_balance(
        &self,
        adapter: &Arc<dyn VenueAdapter>,
        request: &OrderRequest,
        balances: &[Balance],
    ) -> Result<(), GatewayError> {
        match request.side {
            Side::Buy => {
                let unit_price = match request.price {
                    Some(price) => price,
                    None => {
                        let ticker = adapter
                            .fetch_ticker(&request.symbol)
                            .await
                            .map_err(GatewayError::from_submission)?;
                        ticker.last
                    }
                };

                let required = required_quote(request.quantity, unit_price);
                let available = free_balance(balances, &request.symbol.quote);
                if available < required {
                    return Err(GatewayError::InsufficientBalance {
                        asset: request.symbol.quote.clone(),
                        required,
                        available,
                    });
                }
            }
            Side::Sell => {
                let available = free_balance(balances, &request.symbol.base);
                if available < request.quantity {
                    return Err(GatewayError::InsufficientBalance {
                        asset: request.symbol.base.clone(),
                        required: request.quantity,
                        available,
                    });
                }
            }
        }
        Ok(())
    }

    /// 수락된 주문과 알림을 베스트에포트로 저장합니다.
    async fn record_success(&self, user_id: &str, result: &OrderResult) {
        if let Err(e) = self.cascade.insert_order(user_id, result).await {
            warn!(
                "Persistence degraded: order {} not recorded: {}",
                result.venue_order_id, e
            );
        }
        let alert = AlertRecord::order_executed(user_id, result);
        if let Err(e) = self.cascade.insert_alert(&alert).await {
            warn!("Persistence degraded: alert not recorded: {}", e);
        }
    }

    /// 거래소 거부에 대한 실패 알림을 베스트에포트로 저장합니다.
    async fn record_failure(
        &self,
        user_id: &str,
        venue: &str,
        request: &OrderRequest,
        error: &GatewayError,
    ) {
        let alert = AlertRecord::order_failed(
            user_id,
            venue,
            &request.symbol,
            request.quantity,
            &error.to_string(),
        );
        if let Err(e) = self.cascade.insert_alert(&alert).await {
            warn!("Persistence degraded: failure alert not recorded: {}", e);
        }
    }
}
