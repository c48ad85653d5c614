//! 交易构建与签名
//!
//! Build 阶段产出未签名交易，Sign 阶段按值消费私钥并产出原始交易。
//! 私钥在签名结束时随作用域销毁，不论签名是否成功。

pub mod btc;
pub mod eth;

use crate::{domain::wallet::PrivateKeyBytes, error::SendFailure};

pub use btc::UnsignedBitcoinTx;
pub use eth::UnsignedEthereumTx;

/// 未签名交易
#[derive(Debug, Clone)]
pub enum UnsignedTransaction {
    Bitcoin(UnsignedBitcoinTx),
    Ethereum(UnsignedEthereumTx),
}

/// 已签名交易
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// 原始交易（BTC 不带前缀，ETH 带 0x）
    pub raw_hex: String,
    /// 本地计算的交易 ID
    pub tx_id: String,
}

impl UnsignedTransaction {
    /// 签名；`key` 被移动进来并在返回前销毁
    pub fn sign(self, key: PrivateKeyBytes) -> Result<SignedTransaction, SendFailure> {
        match self {
            Self::Bitcoin(tx) => tx.sign(key),
            Self::Ethereum(tx) => tx.sign(key),
        }
    }
}
