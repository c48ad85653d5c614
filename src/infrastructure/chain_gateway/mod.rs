//! 链网关
//!
//! 每条链一个网关：余额、广播、交易查询是公共能力；
//! BTC 额外提供 UTXO 列表，ETH 额外提供 nonce / chain id / gas price。
//! 网关返回原始查询结果，状态归一化在领域层完成。

pub mod esplora;
pub mod evm_rpc;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{chain_config::ChainId, transaction_status::TxLookup},
    error::GatewayError,
};

pub use esplora::EsploraGateway;
pub use evm_rpc::EvmRpcGateway;

/// 公共链网关能力
#[async_trait]
pub trait ChainGateway: Send + Sync {
    fn chain(&self) -> ChainId;

    /// 余额（最小单位：satoshi / wei）
    async fn get_balance(&self, address: &str) -> Result<u128, GatewayError>;

    /// 广播已签名交易，返回交易 ID
    async fn broadcast(&self, raw_tx: &str) -> Result<String, GatewayError>;

    /// 查询交易；节点不认识该交易时返回 `found = false`
    async fn get_transaction(&self, tx_id: &str) -> Result<TxLookup, GatewayError>;
}

/// 未花费输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    /// satoshi
    pub value: u64,
    pub confirmed: bool,
}

#[async_trait]
pub trait BitcoinGateway: ChainGateway {
    async fn list_unspent(&self, address: &str) -> Result<Vec<Utxo>, GatewayError>;
}

#[async_trait]
pub trait EthereumGateway: ChainGateway {
    /// 地址 nonce（包含 pending 交易）
    async fn transaction_count(&self, address: &str) -> Result<u64, GatewayError>;

    async fn chain_id(&self) -> Result<u64, GatewayError>;

    /// 当前 gas price（wei）
    async fn gas_price(&self) -> Result<u128, GatewayError>;
}

/// 按链区分的网关
#[derive(Clone)]
pub enum ChainBackend {
    Bitcoin(Arc<dyn BitcoinGateway>),
    Ethereum(Arc<dyn EthereumGateway>),
}

impl ChainBackend {
    pub fn chain(&self) -> ChainId {
        match self {
            Self::Bitcoin(_) => ChainId::Btc,
            Self::Ethereum(_) => ChainId::Eth,
        }
    }

    pub async fn get_balance(&self, address: &str) -> Result<u128, GatewayError> {
        match self {
            Self::Bitcoin(g) => g.get_balance(address).await,
            Self::Ethereum(g) => g.get_balance(address).await,
        }
    }

    pub async fn broadcast(&self, raw_tx: &str) -> Result<String, GatewayError> {
        match self {
            Self::Bitcoin(g) => g.broadcast(raw_tx).await,
            Self::Ethereum(g) => g.broadcast(raw_tx).await,
        }
    }

    pub async fn get_transaction(&self, tx_id: &str) -> Result<TxLookup, GatewayError> {
        match self {
            Self::Bitcoin(g) => g.get_transaction(tx_id).await,
            Self::Ethereum(g) => g.get_transaction(tx_id).await,
        }
    }
}

impl std::fmt::Debug for ChainBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChainBackend({})", self.chain())
    }
}

/// 网关共用的 HTTP 客户端
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {}", e)))
}
