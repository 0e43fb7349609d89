//! 로컬 파일 저장 계층 (2차 계층).
//!
//! 레코드 유형별 JSON-lines 파일에 추가 기록합니다. 조회는 파일 전체를
//! 읽는 단순한 구조로, Postgres가 내려간 동안의 내구성 있는 대체재입니다.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use pulse_core::{AlertRecord, Credential, OrderResult, Ticker};

use crate::error::StoreError;
use crate::tier::StorageTier;

const ORDERS_FILE: &str = "orders.jsonl";
const ALERTS_FILE: &str = "alerts.jsonl";
const TICKERS_FILE: &str = "tickers.jsonl";
const CREDENTIALS_FILE: &str = "credentials.jsonl";

/// 주문 라인. 주문 결과에 소유 사용자를 덧붙여 기록합니다.
#[derive(Debug, Serialize, Deserialize)]
struct OrderLine {
    user_id: String,
    #[serde(flatten)]
    order: OrderResult,
}

/// 파일 저장 계층.
pub struct FileTier {
    dir: PathBuf,
    // 동시 추가 기록의 라인 교차 방지
    write_lock: Mutex<()>,
}

impl FileTier {
    /// 데이터 디렉터리를 준비하고 계층을 생성합니다.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    async fn append_line<T: Serialize>(&self, file: &str, record: &T) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut handle = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .await?;
        handle.write_all(line.as_bytes()).await?;
        handle.flush().await?;
        Ok(())
    }

    /// 파일의 모든 레코드를 읽습니다. 없는 파일은 빈 목록, 깨진 라인은
    /// 경고 후 건너뜁니다.
    async fn read_lines<T: for<'de> Deserialize<'de>>(
        &self,
        file: &str,
    ) -> Result<Vec<T>, StoreError> {
        let path = self.dir.join(file);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping corrupt line in {}: {}", file, e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl StorageTier for FileTier {
    fn name(&self) -> &str {
        "file"
    }

    async fn insert_order(&self, user_id: &str, order: &OrderResult) -> Result<(), StoreError> {
        let line = OrderLine {
            user_id: user_id.to_string(),
            order: order.clone(),
        };
        self.append_line(ORDERS_FILE, &line).await
    }

    async fn insert_alert(&self, alert: &AlertRecord) -> Result<(), StoreError> {
        self.append_line(ALERTS_FILE, alert).await
    }

    async fn insert_tickers(&self, tickers: &[Ticker]) -> Result<(), StoreError> {
        for ticker in tickers {
            self.append_line(TICKERS_FILE, ticker).await?;
        }
        Ok(())
    }

    async fn recent_orders(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<OrderResult>, StoreError> {
        let lines: Vec<OrderLine> = self.read_lines(ORDERS_FILE).await?;

        // 추가 기록 순서가 곧 시간 순서
        let mut orders: Vec<OrderResult> = lines
            .into_iter()
            .filter(|line| line.user_id == user_id)
            .map(|line| line.order)
            .collect();
        orders.reverse();
        orders.truncate(limit as usize);
        Ok(orders)
    }

    async fn fetch_credential(
        &self,
        user_id: &str,
        venue: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let records: Vec<Credential> = self.read_lines(CREDENTIALS_FILE).await?;

        // 마지막 upsert가 현재 상태
        Ok(records
            .into_iter()
            .rev()
            .find(|c| c.user_id == user_id && c.venue == venue)
            .filter(|c| c.active))
    }

    async fn upsert_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        self.append_line(CREDENTIALS_FILE, credential).await
    }
}
