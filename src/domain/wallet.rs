//! 钱包记录与密钥状态
//!
//! `KeyState` 是带标签的联合体：一条记录在任意时刻只持有
//! 明文私钥、密文、或什么都不持有三者之一。

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::domain::chain_config::{AddressFormat, ChainId, Network};

/// 32 字节私钥（使用Zeroize保护）
///
/// 不实现 `Clone`：所有权从 Resolve 阶段移动到 Sign 阶段，用完即销毁
#[derive(Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct PrivateKeyBytes([u8; 32]);

impl PrivateKeyBytes {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// 解析 64 位十六进制私钥（可带 0x 前缀）
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches("0x");
        if s.len() != 64 {
            return None;
        }
        let decoded = Zeroizing::new(hex::decode(s).ok()?);
        Self::from_slice(&decoded)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0))
    }
}

impl fmt::Debug for PrivateKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyBytes([REDACTED])")
    }
}

/// 生成密文的 KDF / 加密方案标识（不透明）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfRef(pub String);

impl KdfRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KdfRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 私钥状态
pub enum KeyState {
    /// 明文私钥在内存中
    PlaintextKey(PrivateKeyBytes),
    /// 仅持有密文
    EncryptedKey { ciphertext: Vec<u8>, kdf: KdfRef },
    /// 不持有任何密钥材料
    Locked,
}

impl KeyState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlaintextKey(_) => "plaintext",
            Self::EncryptedKey { .. } => "encrypted",
            Self::Locked => "locked",
        }
    }

    pub fn is_plaintext(&self) -> bool {
        matches!(self, Self::PlaintextKey(_))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::EncryptedKey { .. })
    }
}

impl fmt::Debug for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlaintextKey(_) => f.write_str("PlaintextKey([REDACTED])"),
            Self::EncryptedKey { ciphertext, kdf } => f
                .debug_struct("EncryptedKey")
                .field("ciphertext_len", &ciphertext.len())
                .field("kdf", kdf)
                .finish(),
            Self::Locked => f.write_str("Locked"),
        }
    }
}

/// 钱包记录
#[derive(Debug)]
pub struct WalletRecord {
    pub address: String,
    pub chain: ChainId,
    pub network: Network,
    pub key_state: KeyState,
    pub address_format: AddressFormat,
}

impl WalletRecord {
    /// 不持有密钥的记录（仅地址，用于余额查询或格式偏好）
    pub fn watch_only(
        address: impl Into<String>,
        chain: ChainId,
        network: Network,
        address_format: AddressFormat,
    ) -> Self {
        Self {
            address: address.into(),
            chain,
            network,
            key_state: KeyState::Locked,
            address_format,
        }
    }

    /// 导入已加密的私钥（例如 CLI 传入的十六进制密文）
    pub fn from_ciphertext(
        address: impl Into<String>,
        chain: ChainId,
        network: Network,
        address_format: AddressFormat,
        ciphertext: Vec<u8>,
        kdf: KdfRef,
    ) -> Self {
        Self {
            address: address.into(),
            chain,
            network,
            key_state: KeyState::EncryptedKey { ciphertext, kdf },
            address_format,
        }
    }

    /// 密文（仅 EncryptedKey 状态）
    pub fn ciphertext(&self) -> Option<&[u8]> {
        match &self.key_state {
            KeyState::EncryptedKey { ciphertext, .. } => Some(ciphertext),
            _ => None,
        }
    }
}

/// 加密信封：Lock 操作的一次性返回值
///
/// 密码只在这里出现一次，不写入记录、不记录日志
pub struct EncryptionEnvelope {
    pub ciphertext: Vec<u8>,
    pub password_reference: Zeroizing<String>,
    /// 密码是否由加密服务自动生成
    pub generated: bool,
}

impl EncryptionEnvelope {
    pub fn ciphertext_hex(&self) -> String {
        hex::encode(&self.ciphertext)
    }
}

impl fmt::Debug for EncryptionEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionEnvelope")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("password_reference", &"[REDACTED]")
            .field("generated", &self.generated)
            .finish()
    }
}
