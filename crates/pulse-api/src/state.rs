//! 공유 애플리케이션 상태.

use std::sync::Arc;

use async_trait::async_trait;

use pulse_gateway::OrderGateway;
use pulse_market::BroadcastHub;
use pulse_store::PersistenceCascade;
use pulse_venue::{CredentialSource, SourceError, VenueRegistry};

use crate::auth::IdentityVerifier;

/// 핸들러에 주입되는 공유 상태.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<VenueRegistry>,
    pub cascade: Arc<PersistenceCascade>,
    pub hub: Arc<BroadcastHub>,
    pub gateway: Arc<OrderGateway>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

/// 캐스케이드를 레지스트리의 자격증명 소스로 잇는 브리지.
pub struct CascadeCredentialSource {
    cascade: Arc<PersistenceCascade>,
}

impl CascadeCredentialSource {
    pub fn new(cascade: Arc<PersistenceCascade>) -> Self {
        Self { cascade }
    }
}

#[async_trait]
impl CredentialSource for CascadeCredentialSource {
    async fn fetch_envelope(
        &self,
        user_id: &str,
        venue: &str,
    ) -> Result<Option<String>, SourceError> {
        let credential = self.cascade.fetch_credential(user_id, venue).await?;
        Ok(credential.map(|c| c.envelope))
    }
}
