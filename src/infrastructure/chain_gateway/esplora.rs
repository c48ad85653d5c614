//! Bitcoin 网关（Esplora REST API）
//!
//! 兼容 blockstream.info / mempool.space 的接口：
//! - `GET  /address/{addr}`          余额
//! - `GET  /address/{addr}/utxo`     UTXO 列表
//! - `POST /tx`                      广播（body 为原始交易 hex，返回 txid）
//! - `GET  /tx/{txid}/status`        确认状态（404 表示节点不认识）
//! - `GET  /blocks/tip/height`       最新区块高度

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{build_http_client, BitcoinGateway, ChainGateway, Utxo};
use crate::{
    domain::{chain_config::ChainId, transaction_status::TxLookup},
    error::GatewayError,
    infrastructure::{log_redact::redact_address, rpc_validator::validate_tx_hash},
};

#[derive(Debug, Deserialize)]
struct AddressStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct AddressInfo {
    chain_stats: AddressStats,
}

#[derive(Debug, Deserialize)]
struct UtxoStatus {
    confirmed: bool,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    status: UtxoStatus,
}

#[derive(Debug, Deserialize)]
struct TxStatusResponse {
    confirmed: bool,
    #[serde(default)]
    block_height: Option<u64>,
}

/// Esplora 客户端
pub struct EsploraGateway {
    http_client: reqwest::Client,
    base_url: String,
}

impl EsploraGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET 并返回响应体；非 2xx 转为 [`GatewayError::Http`]
    async fn get_text(&self, path: &str) -> Result<(StatusCode, String), GatewayError> {
        let response = self.http_client.get(self.url(path)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, GatewayError> {
        let (status, body) = self.get_text(path).await?;
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("{}: {}", path, e)))
    }

    async fn tip_height(&self) -> Result<u64, GatewayError> {
        let (status, body) = self.get_text("/blocks/tip/height").await?;
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }
        body.trim()
            .parse::<u64>()
            .map_err(|e| GatewayError::InvalidResponse(format!("tip height: {}", e)))
    }
}

#[async_trait]
impl ChainGateway for EsploraGateway {
    fn chain(&self) -> ChainId {
        ChainId::Btc
    }

    async fn get_balance(&self, address: &str) -> Result<u128, GatewayError> {
        let info: AddressInfo = self.get_json(&format!("/address/{}", address)).await?;
        let balance = confirmed_balance(&info.chain_stats);
        tracing::debug!(
            address = %redact_address(address),
            balance_sats = balance,
            "Fetched bitcoin balance"
        );
        Ok(balance as u128)
    }

    async fn broadcast(&self, raw_tx: &str) -> Result<String, GatewayError> {
        let response = self
            .http_client
            .post(self.url("/tx"))
            .header("Content-Type", "text/plain")
            .body(raw_tx.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Bitcoin broadcast rejected");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let txid = validate_tx_hash(&body, false)?;
        tracing::info!(
            tx_id = %txid,
            endpoint = %self.base_url,
            "Bitcoin transaction broadcast successful"
        );
        Ok(txid)
    }

    async fn get_transaction(&self, tx_id: &str) -> Result<TxLookup, GatewayError> {
        // 非法 txid 不拼进 URL
        let tx_id = match validate_tx_hash(tx_id, false) {
            Ok(hash) => hash,
            Err(_) => return Ok(TxLookup::not_found()),
        };

        let (status, body) = self.get_text(&format!("/tx/{}/status", tx_id)).await?;
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Ok(TxLookup::not_found());
        }
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let tx_status: TxStatusResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("tx status: {}", e)))?;

        let tip = match (tx_status.confirmed, tx_status.block_height) {
            (true, Some(_)) => match self.tip_height().await {
                Ok(tip) => Some(tip),
                Err(e) => {
                    tracing::warn!(tx_id = %tx_id, error = %e, "Tip height unavailable");
                    None
                }
            },
            _ => None,
        };

        Ok(tx_lookup(&tx_status, tip))
    }
}

#[async_trait]
impl BitcoinGateway for EsploraGateway {
    async fn list_unspent(&self, address: &str) -> Result<Vec<Utxo>, GatewayError> {
        let utxos: Vec<EsploraUtxo> = self
            .get_json(&format!("/address/{}/utxo", address))
            .await?;
        Ok(utxos.into_iter().map(Utxo::from).collect())
    }
}

impl From<EsploraUtxo> for Utxo {
    fn from(u: EsploraUtxo) -> Self {
        Self {
            txid: u.txid,
            vout: u.vout,
            value: u.value,
            confirmed: u.status.confirmed,
        }
    }
}

fn confirmed_balance(stats: &AddressStats) -> u64 {
    stats.funded_txo_sum.saturating_sub(stats.spent_txo_sum)
}

/// 已确认但拿不到 tip 高度时按 1 个确认计
fn tx_lookup(tx_status: &TxStatusResponse, tip: Option<u64>) -> TxLookup {
    let confirmations = match (tx_status.confirmed, tx_status.block_height, tip) {
        (true, Some(height), Some(tip)) => confirmations_at(tip, height),
        (true, _, _) => 1,
        (false, _, _) => 0,
    };
    TxLookup {
        found: true,
        confirmations: Some(confirmations),
        ..Default::default()
    }
}

/// 交易所在区块本身算 1 个确认
fn confirmations_at(tip: u64, block_height: u64) -> u64 {
    tip.saturating_sub(block_height) + 1
}
