//! 多链钱包：私钥生命周期管理与交易编排
//!
//! 私钥在内存中只以三种状态之一存在（明文 / 密文 / 无），
//! BTC 与 ETH 的发送流水线从不跨状态迁移或网络调用泄露明文私钥。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use error::{Result, WalletError};

// 统一模块导出
pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{
            AddressFormat, ChainId, EncryptionEnvelope, FeeOptions, FeeSpec, KeyState, Network,
            StatusReport, TransactionHandle, TransactionRequest, TxStatus, WalletRecord,
        },
        error::{SendStage, WalletError},
        service::{
            AddressFormatResolver, NetworkHandle, TransactionOrchestrator, WalletLifecycleManager,
            WalletSession,
        },
    };
}
