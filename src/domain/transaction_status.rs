//! 统一交易状态定义
//!
//! 网关返回的原始查询结果（[`TxLookup`]）在这里被归一化为 [`TxStatus`]。
//! "尚未上链" 和 "查不到" 都是显式状态，而不是错误。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::chain_config::ChainId;

/// 归一化后的交易状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// 已广播，等待上链
    Pending,
    /// 已上链且执行成功
    Confirmed,
    /// 已上链但执行失败（revert）
    Failed,
    /// 查询失败或节点不认识该交易
    Unknown,
}

impl TxStatus {
    /// 是否为最终状态
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 广播成功后返回的交易句柄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHandle {
    pub tx_id: String,
    pub chain: ChainId,
    pub status: TxStatus,
}

impl TransactionHandle {
    pub fn pending(tx_id: impl Into<String>, chain: ChainId) -> Self {
        Self {
            tx_id: tx_id.into(),
            chain,
            status: TxStatus::Pending,
        }
    }
}

/// ETH 交易收据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub success: bool,
    pub block_number: u64,
}

/// 网关的原始查询结果
///
/// 缺失字段表示 "未知"，而不是 0
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxLookup {
    /// 节点是否认识这笔交易
    pub found: bool,
    /// BTC 确认数
    pub confirmations: Option<u64>,
    /// ETH 收据
    pub receipt: Option<Receipt>,
    /// ETH 当前区块高度
    pub current_block: Option<u64>,
}

impl TxLookup {
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// 状态查询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub tx_id: String,
    pub chain: ChainId,
    pub status: TxStatus,
    pub confirmations: Option<u64>,
    pub checked_at: DateTime<Utc>,
}

/// 归一化：收据优先于确认数
pub fn normalize(chain: ChainId, lookup: &TxLookup) -> (TxStatus, Option<u64>) {
    match chain {
        ChainId::Btc => normalize_utxo(lookup),
        ChainId::Eth => normalize_account(lookup),
    }
}

/// BTC：确认数 > 0 为 Confirmed，已知但 0 确认为 Pending，查不到为 Unknown
fn normalize_utxo(lookup: &TxLookup) -> (TxStatus, Option<u64>) {
    if !lookup.found {
        return (TxStatus::Unknown, None);
    }
    match lookup.confirmations {
        Some(n) if n > 0 => (TxStatus::Confirmed, Some(n)),
        Some(_) => (TxStatus::Pending, Some(0)),
        None => (TxStatus::Pending, None),
    }
}

/// ETH：有收据按收据状态判定，无收据但交易已知为 Pending
fn normalize_account(lookup: &TxLookup) -> (TxStatus, Option<u64>) {
    if let Some(receipt) = lookup.receipt {
        let confirmations = lookup
            .current_block
            .map(|current| current.saturating_sub(receipt.block_number));
        let status = if receipt.success {
            TxStatus::Confirmed
        } else {
            TxStatus::Failed
        };
        return (status, confirmations);
    }

    if lookup.found {
        (TxStatus::Pending, None)
    } else {
        (TxStatus::Unknown, None)
    }
}
