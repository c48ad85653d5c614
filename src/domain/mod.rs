//! Domain 模块
//!
//! 包含核心领域模型：钱包记录、密钥状态、交易请求与状态

pub mod chain_config;
pub mod derivation;
pub mod transaction;
pub mod transaction_status;
pub mod wallet;

// 重新导出常用类型
pub use chain_config::{AddressFormat, ChainId, Network, WitnessType};
pub use transaction::{Balance, FeeOptions, FeeSpec, TransactionRequest};
pub use transaction_status::{Receipt, StatusReport, TransactionHandle, TxLookup, TxStatus};
pub use wallet::{EncryptionEnvelope, KdfRef, KeyState, PrivateKeyBytes, WalletRecord};
