//! 基础设施模块
//!
//! 外部协作方的适配器（密钥服务、链网关）以及日志、加密、校验等通用能力

pub mod chain_gateway;
pub mod encryption;
pub mod key_service;
pub mod log_redact;
pub mod logging;
pub mod rpc_validator;

pub use chain_gateway::{
    BitcoinGateway, ChainBackend, ChainGateway, EsploraGateway, EthereumGateway, EvmRpcGateway,
    Utxo,
};
pub use key_service::{
    CoreProcessService, KeyDerivationService, KeyEncryptionService, LocalKeyService,
};
