//! 错误类型定义
//!
//! 每个对外操作都返回 [`WalletError`]，按失败的生命周期阶段分类；
//! 外部服务适配器返回 [`ServiceError`] / [`GatewayError`]，
//! 在管理器 / 编排器边界处被包装，原始原因作为 `source` 保留。

use std::{fmt, time::Duration};

use thiserror::Error;

use crate::domain::chain_config::ChainId;

/// 钱包操作的统一错误
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    #[error("lock failed: {0}")]
    Lock(#[from] LockError),

    #[error("unlock failed: {0}")]
    Unlock(#[from] UnlockError),

    #[error("reformat failed: {0}")]
    Reformat(#[from] ReformatError),

    #[error(transparent)]
    Send(#[from] SendError),

    /// 派生 / 加密服务或链网关不可达、超时
    #[error("service unavailable: {0}")]
    ServiceUnavailable(#[source] ServiceError),

    /// 发送流水线之外的链网关失败（余额查询等），超时除外
    #[error("chain gateway error: {0}")]
    Gateway(#[source] GatewayError),

    /// 请求本身不合法，在任何网关调用之前拒绝
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl WalletError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// 发送失败时所处的阶段
    pub fn send_stage(&self) -> Option<SendStage> {
        match self {
            Self::Send(e) => Some(e.stage),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DerivationError {
    /// 派生服务响应少于两行，或行格式不是 `Label: value`
    #[error("malformed derivation response: {0}")]
    MalformedResponse(String),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("derivation service rejected request: {0}")]
    Rejected(#[source] ServiceError),
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("wallet key is already encrypted")]
    AlreadyEncrypted,

    #[error("wallet holds no key material")]
    NoKeyMaterial,

    #[error("encryption failed: {0}")]
    Encryption(#[source] ServiceError),
}

#[derive(Debug, Error)]
pub enum UnlockError {
    #[error("wallet key is not encrypted")]
    NotEncrypted,

    /// 密码错误或密文损坏
    #[error("decryption failed (wrong password or corrupted ciphertext)")]
    Decryption,

    #[error("decrypted bytes are not a valid private key")]
    InvalidKey,

    #[error("decrypted key does not match wallet address (expected {expected}, got {actual})")]
    AddressMismatch { expected: String, actual: String },

    #[error("encryption service rejected request: {0}")]
    Rejected(#[source] ServiceError),
}

#[derive(Debug, Error)]
pub enum ReformatError {
    #[error("address formats are not supported on {0}")]
    UnsupportedChain(ChainId),

    #[error("wallet key is encrypted; unlock before changing address format")]
    RequiresUnlockedKey,

    #[error("address encoding failed: {0}")]
    Encoding(String),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 发送流水线错误
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 发送流水线阶段：Resolve → Build → Sign → Broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendStage {
    Resolve,
    Build,
    Sign,
    Broadcast,
}

impl SendStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Build => "build",
            Self::Sign => "sign",
            Self::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("send failed at {stage} stage: {cause}")]
pub struct SendError {
    pub stage: SendStage,
    #[source]
    pub cause: SendFailure,
}

impl SendError {
    pub fn new(stage: SendStage, cause: impl Into<SendFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SendFailure {
    /// 明文私钥的钱包不允许直接发送，必须先加密
    #[error("wallet holds a plaintext key; lock it before sending")]
    UnlockedKeyPolicy,

    #[error(transparent)]
    Unlock(#[from] UnlockError),

    #[error("key service unavailable: {0}")]
    ServiceUnavailable(#[source] ServiceError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: u128, available: u128 },

    #[error("transaction build failed: {0}")]
    Build(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("cancelled")]
    Cancelled,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 外部协作方错误
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 密钥派生 / 加密服务错误
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("decryption failed")]
    Decryption,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("{0}")]
    Rejected(String),
}

impl ServiceError {
    /// 超时和不可达属于可用性问题，其余属于请求本身的失败
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unreachable(_))
    }
}

/// 链网关错误
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

}

impl From<GatewayError> for WalletError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout => Self::ServiceUnavailable(ServiceError::Unreachable(
                "chain gateway timed out".into(),
            )),
            other => Self::Gateway(other),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

pub type Result<T, E = WalletError> = std::result::Result<T, E>;
