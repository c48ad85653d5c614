//! 网络句柄
//!
//! 每个句柄固定一条链、一个网络和对应的网关。切换网络不修改旧句柄，
//! 而是构造新句柄；绑定在旧句柄上的钱包由会话负责丢弃。

use std::sync::Arc;

use crate::{
    config::Config,
    domain::{
        chain_config::{ChainId, Network},
        transaction::{DEFAULT_BTC_FEE_SATS, DEFAULT_ETH_GAS_LIMIT},
    },
    error::GatewayError,
    infrastructure::chain_gateway::{ChainBackend, EsploraGateway, EvmRpcGateway},
};

/// 未显式指定时使用的费用参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeDefaults {
    pub btc_fee_sats: u64,
    pub eth_gas_limit: u64,
}

impl Default for FeeDefaults {
    fn default() -> Self {
        Self {
            btc_fee_sats: DEFAULT_BTC_FEE_SATS,
            eth_gas_limit: DEFAULT_ETH_GAS_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkHandle {
    network: Network,
    backend: ChainBackend,
    fee_defaults: FeeDefaults,
}

impl NetworkHandle {
    pub fn new(network: Network, backend: ChainBackend) -> Self {
        Self {
            network,
            backend,
            fee_defaults: FeeDefaults::default(),
        }
    }

    pub fn with_fee_defaults(mut self, fee_defaults: FeeDefaults) -> Self {
        self.fee_defaults = fee_defaults;
        self
    }

    /// 按配置构造网关
    pub fn from_config(
        chain: ChainId,
        network: Network,
        config: &Config,
    ) -> Result<Self, GatewayError> {
        let timeout = config.services.gateway_timeout();
        let backend = match chain {
            ChainId::Btc => {
                let url = config.bitcoin.esplora_url_for(network);
                ChainBackend::Bitcoin(Arc::new(EsploraGateway::new(url, timeout)?))
            }
            ChainId::Eth => {
                let url = config.ethereum.rpc_url_for(network);
                ChainBackend::Ethereum(Arc::new(EvmRpcGateway::new(url, timeout)?))
            }
        };

        tracing::debug!(chain = %chain, network = %network, "Network handle created");

        Ok(Self::new(network, backend).with_fee_defaults(FeeDefaults {
            btc_fee_sats: config.bitcoin.default_fee_sats,
            eth_gas_limit: config.ethereum.default_gas_limit,
        }))
    }

    pub fn chain(&self) -> ChainId {
        self.backend.chain()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn backend(&self) -> &ChainBackend {
        &self.backend
    }

    pub fn fee_defaults(&self) -> FeeDefaults {
        self.fee_defaults
    }
}
