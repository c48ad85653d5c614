// Ethereum 网关 - JSON-RPC 实现
// 余额、nonce、gas price、广播、交易与收据查询

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use super::{build_http_client, ChainGateway, EthereumGateway};
use crate::{
    domain::{
        chain_config::ChainId,
        transaction_status::{Receipt, TxLookup},
    },
    error::GatewayError,
    infrastructure::{
        log_redact::{redact_address, redact_hex_string},
        rpc_validator::{
            validate_balance, validate_gas_price, validate_nonce, validate_rpc_response,
            validate_tx_hash, validate_u64,
        },
    },
};

pub struct EvmRpcGateway {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: AtomicU64,
}

impl EvmRpcGateway {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            rpc_url: rpc_url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// 调用 JSON-RPC 方法，返回 result 字段（null 时为 None）
    async fn call(&self, method: &str, params: Value) -> Result<Option<Value>, GatewayError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("{}: {}", method, e)))?;

        Ok(validate_rpc_response(&json)?.cloned())
    }

    /// 调用返回十六进制字符串的方法
    async fn call_hex(&self, method: &str, params: Value) -> Result<String, GatewayError> {
        self.call(method, params)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| GatewayError::InvalidResponse(format!("{} returned no value", method)))
    }

    async fn block_number(&self) -> Result<u64, GatewayError> {
        let hex = self.call_hex("eth_blockNumber", serde_json::json!([])).await?;
        validate_u64(&hex, "block number")
    }
}

/// 解析收据；缺少 status 字段（拜占庭分叉前）视为成功
fn parse_receipt(receipt: &Value) -> Result<Receipt, GatewayError> {
    let block_number = receipt
        .get("blockNumber")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::InvalidResponse("receipt missing blockNumber".into()))
        .and_then(|s| validate_u64(s, "receipt block number"))?;

    let success = match receipt.get("status").and_then(|v| v.as_str()) {
        Some(s) => validate_u64(s, "receipt status")? == 1,
        None => true,
    };

    Ok(Receipt {
        success,
        block_number,
    })
}

#[async_trait]
impl ChainGateway for EvmRpcGateway {
    fn chain(&self) -> ChainId {
        ChainId::Eth
    }

    async fn get_balance(&self, address: &str) -> Result<u128, GatewayError> {
        let hex = self
            .call_hex("eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;
        let balance = validate_balance(&hex)?;
        tracing::debug!(
            address = %redact_address(address),
            balance_wei = %balance,
            "Fetched ethereum balance"
        );
        Ok(balance)
    }

    async fn broadcast(&self, raw_tx: &str) -> Result<String, GatewayError> {
        // 验证交易数据格式
        if !raw_tx.starts_with("0x") || raw_tx.len() < 10 {
            return Err(GatewayError::InvalidResponse(
                "raw transaction must be 0x-prefixed hex".into(),
            ));
        }

        tracing::debug!(
            endpoint = %self.rpc_url,
            raw_tx = %redact_hex_string(raw_tx, 10),
            "Attempting to broadcast EVM transaction"
        );

        let hash = self
            .call_hex("eth_sendRawTransaction", serde_json::json!([raw_tx]))
            .await?;
        let tx_hash = validate_tx_hash(&hash, true)?;

        tracing::info!(
            tx_hash = %tx_hash,
            endpoint = %self.rpc_url,
            "EVM transaction broadcast successful"
        );
        Ok(tx_hash)
    }

    async fn get_transaction(&self, tx_id: &str) -> Result<TxLookup, GatewayError> {
        // null result 表示交易尚未确认
        if let Some(receipt) = self
            .call("eth_getTransactionReceipt", serde_json::json!([tx_id]))
            .await?
        {
            let receipt = parse_receipt(&receipt)?;
            // 当前高度查询失败时确认数未知，状态仍以收据为准
            let current_block = match self.block_number().await {
                Ok(n) => Some(n),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch current block number");
                    None
                }
            };
            return Ok(TxLookup {
                found: true,
                confirmations: None,
                receipt: Some(receipt),
                current_block,
            });
        }

        let known = self
            .call("eth_getTransactionByHash", serde_json::json!([tx_id]))
            .await?
            .is_some();

        Ok(TxLookup {
            found: known,
            ..Default::default()
        })
    }
}

#[async_trait]
impl EthereumGateway for EvmRpcGateway {
    async fn transaction_count(&self, address: &str) -> Result<u64, GatewayError> {
        let hex = self
            .call_hex(
                "eth_getTransactionCount",
                serde_json::json!([address, "pending"]),
            )
            .await?;
        validate_nonce(&hex)
    }

    async fn chain_id(&self) -> Result<u64, GatewayError> {
        let hex = self.call_hex("eth_chainId", serde_json::json!([])).await?;
        validate_u64(&hex, "chain id")
    }

    async fn gas_price(&self) -> Result<u128, GatewayError> {
        let hex = self.call_hex("eth_gasPrice", serde_json::json!([])).await?;
        validate_gas_price(&hex)
    }
}
