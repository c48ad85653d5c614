//! 密钥派生 / 加密服务
//!
//! 生命周期管理器只通过这两个 trait 访问外部协作方：
//! - [`KeyDerivationService`]：助记词 → 两行文本 `"<X> Address: ..."` / `"Private Key: ..."`
//! - [`KeyEncryptionService`]：私钥 ⇄ 密文，未提供密码时自动生成
//!
//! 提供两种实现：进程内的 [`LocalKeyService`]，以及调用外部 core 可执行文件的
//! [`CoreProcessService`]。

use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use zeroize::Zeroizing;

use crate::{
    domain::{
        chain_config::{AddressFormat, ChainId, Network, WitnessType},
        derivation,
        wallet::{KdfRef, PrivateKeyBytes},
    },
    error::{DerivationError, ServiceError},
    infrastructure::encryption,
};

/// 密钥派生服务
#[async_trait]
pub trait KeyDerivationService: Send + Sync {
    /// 账户链（ETH）派生，m/44'/60'/0'/0/0
    async fn derive(&self, mnemonic: &str) -> Result<Zeroizing<String>, ServiceError>;

    /// UTXO 链（BTC）派生，m/44'/0'/0'/0/0，地址按 witness 类型编码
    async fn derive_utxo(
        &self,
        mnemonic: &str,
        witness: WitnessType,
        network: Network,
    ) -> Result<Zeroizing<String>, ServiceError>;

    /// 生成 12 词助记词
    async fn generate_mnemonic(&self) -> Result<Zeroizing<String>, ServiceError>;
}

/// 加密结果
pub struct EncryptedKey {
    pub ciphertext: Vec<u8>,
    /// 调用方未提供密码时由服务生成
    pub generated_password: Option<Zeroizing<String>>,
}

/// 密钥加密服务
#[async_trait]
pub trait KeyEncryptionService: Send + Sync {
    /// 该服务产出的密文的方案标识
    fn kdf(&self) -> KdfRef;

    async fn encrypt(
        &self,
        key: &PrivateKeyBytes,
        password: Option<&str>,
    ) -> Result<EncryptedKey, ServiceError>;

    async fn decrypt(&self, ciphertext: &[u8], password: &str)
        -> Result<PrivateKeyBytes, ServiceError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 派生响应解析
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const PRIVATE_KEY_LABEL: &str = "Private Key";

/// 解析后的派生响应
#[derive(Debug)]
pub struct DerivedKey {
    pub address: String,
    pub private_key: PrivateKeyBytes,
}

/// 拆分一行 `Label: value`
fn split_labeled_line(line: &str) -> Option<(&str, &str)> {
    let (label, value) = line.split_once(':')?;
    let label = label.trim();
    let value = value.trim();
    if label.is_empty() || value.is_empty() {
        return None;
    }
    Some((label, value))
}

/// 解析派生服务的两行响应
///
/// 第一行标签必须以 `Address` 结尾，第二行标签必须是 `Private Key`；
/// 私钥接受 64 位十六进制或 WIF
pub fn parse_derivation_response(response: &str) -> Result<DerivedKey, DerivationError> {
    let mut lines = response.lines().map(str::trim).filter(|l| !l.is_empty());

    let (first, second) = match (lines.next(), lines.next()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(DerivationError::MalformedResponse(
                "expected two lines (address, private key)".into(),
            ))
        }
    };

    let (address_label, address) = split_labeled_line(first).ok_or_else(|| {
        DerivationError::MalformedResponse("first line is not 'Label: value'".into())
    })?;
    if !address_label.ends_with("Address") {
        return Err(DerivationError::MalformedResponse(format!(
            "expected an address label, got '{}'",
            address_label
        )));
    }

    // 第二行包含私钥，错误信息中不能回显内容
    let (key_label, key_value) = split_labeled_line(second).ok_or_else(|| {
        DerivationError::MalformedResponse("second line is not 'Label: value'".into())
    })?;
    if key_label != PRIVATE_KEY_LABEL {
        return Err(DerivationError::MalformedResponse(format!(
            "expected '{}' label, got '{}'",
            PRIVATE_KEY_LABEL, key_label
        )));
    }

    let private_key = derivation::parse_private_key(key_value).ok_or_else(|| {
        DerivationError::InvalidKey("private key is neither 64 hex characters nor WIF".into())
    })?;

    Ok(DerivedKey {
        address: address.to_string(),
        private_key,
    })
}

/// 渲染两行派生响应
fn render_derivation_response(
    chain: ChainId,
    address: &str,
    key: &PrivateKeyBytes,
) -> Zeroizing<String> {
    let label = match chain {
        ChainId::Eth => "Ethereum Address",
        ChainId::Btc => "Bitcoin Address",
    };
    Zeroizing::new(format!(
        "{}: {}\n{}: {}\n",
        label,
        address,
        PRIVATE_KEY_LABEL,
        key.to_hex().as_str()
    ))
}

fn format_for_witness(witness: WitnessType) -> AddressFormat {
    match witness {
        WitnessType::Legacy => AddressFormat::Legacy,
        WitnessType::SegwitWrapped => AddressFormat::Segwit,
        WitnessType::SegwitNative => AddressFormat::Bech32,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 进程内实现
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 进程内密钥服务：bip39 + coins-bip32 派生，argon2id + AES-256-GCM 加密
///
/// 计算密集的步骤放在 `spawn_blocking` 中执行
#[derive(Debug, Clone, Default)]
pub struct LocalKeyService;

impl LocalKeyService {
    pub fn new() -> Self {
        Self
    }

    fn derive_blocking(
        mnemonic: &str,
        chain: ChainId,
        format: AddressFormat,
        network: Network,
    ) -> Result<Zeroizing<String>, ServiceError> {
        let key = derivation::derive_private_key(mnemonic, chain).map_err(|e| match e {
            DerivationError::InvalidMnemonic(msg) => ServiceError::InvalidMnemonic(msg),
            other => ServiceError::Rejected(other.to_string()),
        })?;
        let address = derivation::encode_address(&key, chain, format, network)
            .map_err(|e| ServiceError::Rejected(e.to_string()))?;
        Ok(render_derivation_response(chain, &address, &key))
    }

    async fn run_blocking<T, F>(f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| ServiceError::Unreachable(format!("worker task failed: {}", e)))?
    }
}

#[async_trait]
impl KeyDerivationService for LocalKeyService {
    async fn derive(&self, mnemonic: &str) -> Result<Zeroizing<String>, ServiceError> {
        let mnemonic = Zeroizing::new(mnemonic.to_string());
        Self::run_blocking(move || {
            Self::derive_blocking(&mnemonic, ChainId::Eth, AddressFormat::Legacy, Network::Mainnet)
        })
        .await
    }

    async fn derive_utxo(
        &self,
        mnemonic: &str,
        witness: WitnessType,
        network: Network,
    ) -> Result<Zeroizing<String>, ServiceError> {
        let mnemonic = Zeroizing::new(mnemonic.to_string());
        let format = format_for_witness(witness);
        Self::run_blocking(move || Self::derive_blocking(&mnemonic, ChainId::Btc, format, network))
            .await
    }

    async fn generate_mnemonic(&self) -> Result<Zeroizing<String>, ServiceError> {
        derivation::generate_mnemonic(12).map_err(|e| ServiceError::Rejected(e.to_string()))
    }
}

#[async_trait]
impl KeyEncryptionService for LocalKeyService {
    fn kdf(&self) -> KdfRef {
        KdfRef(encryption::KDF_LABEL.to_string())
    }

    async fn encrypt(
        &self,
        key: &PrivateKeyBytes,
        password: Option<&str>,
    ) -> Result<EncryptedKey, ServiceError> {
        let (password, generated) = match password {
            Some(p) => (Zeroizing::new(p.to_string()), false),
            None => (encryption::generate_password(), true),
        };
        let key = PrivateKeyBytes::new(*key.as_bytes());
        let pw = password.clone();

        let ciphertext =
            Self::run_blocking(move || encryption::encrypt_data(key.as_bytes(), &pw)).await?;

        Ok(EncryptedKey {
            ciphertext,
            generated_password: generated.then_some(password),
        })
    }

    async fn decrypt(
        &self,
        ciphertext: &[u8],
        password: &str,
    ) -> Result<PrivateKeyBytes, ServiceError> {
        let ciphertext = ciphertext.to_vec();
        let password = Zeroizing::new(password.to_string());

        Self::run_blocking(move || {
            let plaintext = encryption::decrypt_data(&ciphertext, &password)?;
            PrivateKeyBytes::from_slice(&plaintext).ok_or(ServiceError::Decryption)
        })
        .await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 外部 core 可执行文件
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 调用外部 core 可执行文件的密钥服务
///
/// 命令：`generate-mnemonic`、`derive-key <mnemonic>`、
/// `derive-btc <mnemonic> <witness>`、`encrypt <hex> <password>`、
/// `decrypt <hex> <password>`。core 只支持 BTC 主网。
///
/// 超时由调用方控制；future 被丢弃时子进程随之被杀死（kill_on_drop）。
#[derive(Debug, Clone)]
pub struct CoreProcessService {
    binary: PathBuf,
}

/// core 可执行文件使用的加密方案标识
pub const CORE_KDF_LABEL: &str = "core-scrypt-aes256gcm";

impl CoreProcessService {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// 执行一条命令，返回标准输出
    async fn run(&self, args: &[&str]) -> Result<Zeroizing<String>, ServiceError> {
        let command = args.first().copied().unwrap_or_default();
        tracing::debug!(binary = %self.binary.display(), command, "Invoking key core");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ServiceError::Unreachable(format!("{}: {}", self.binary.display(), e))
            })?;

        let stdout = Zeroizing::new(String::from_utf8_lossy(&output.stdout).into_owned());

        if !output.status.success() {
            // core 的错误信息打印在 stdout 或 stderr，均不含密钥
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            tracing::warn!(command, status = ?output.status.code(), "Key core command failed");
            if message.to_lowercase().contains("mnemonic") {
                return Err(ServiceError::InvalidMnemonic(message));
            }
            return Err(ServiceError::Rejected(message));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl KeyDerivationService for CoreProcessService {
    async fn derive(&self, mnemonic: &str) -> Result<Zeroizing<String>, ServiceError> {
        self.run(&["derive-key", mnemonic]).await
    }

    async fn derive_utxo(
        &self,
        mnemonic: &str,
        witness: WitnessType,
        network: Network,
    ) -> Result<Zeroizing<String>, ServiceError> {
        if network != Network::Mainnet {
            return Err(ServiceError::Rejected(format!(
                "key core only derives mainnet addresses, requested {}",
                network
            )));
        }
        self.run(&["derive-btc", mnemonic, witness.wire_name()]).await
    }

    async fn generate_mnemonic(&self) -> Result<Zeroizing<String>, ServiceError> {
        let output = self.run(&["generate-mnemonic"]).await?;
        let mnemonic = output.trim();
        if mnemonic.split_whitespace().count() < 12 {
            return Err(ServiceError::MalformedResponse(
                "core returned a short mnemonic".into(),
            ));
        }
        Ok(Zeroizing::new(mnemonic.to_string()))
    }
}

#[async_trait]
impl KeyEncryptionService for CoreProcessService {
    fn kdf(&self) -> KdfRef {
        KdfRef(CORE_KDF_LABEL.to_string())
    }

    async fn encrypt(
        &self,
        key: &PrivateKeyBytes,
        password: Option<&str>,
    ) -> Result<EncryptedKey, ServiceError> {
        let (password, generated) = match password {
            Some(p) => (Zeroizing::new(p.to_string()), false),
            None => (encryption::generate_password(), true),
        };
        let key_hex = key.to_hex();

        let output = self.run(&["encrypt", key_hex.as_str(), password.as_str()]).await?;
        let ciphertext = hex::decode(output.trim())
            .map_err(|e| ServiceError::MalformedResponse(format!("ciphertext is not hex: {}", e)))?;
        if ciphertext.is_empty() {
            return Err(ServiceError::Encryption("core returned empty ciphertext".into()));
        }

        Ok(EncryptedKey {
            ciphertext,
            generated_password: generated.then_some(password),
        })
    }

    async fn decrypt(
        &self,
        ciphertext: &[u8],
        password: &str,
    ) -> Result<PrivateKeyBytes, ServiceError> {
        let ciphertext_hex = hex::encode(ciphertext);
        let output = self.run(&["decrypt", &ciphertext_hex, password]).await?;

        // 解密失败时 core 输出空串
        let plaintext =
            Zeroizing::new(hex::decode(output.trim()).map_err(|_| ServiceError::Decryption)?);
        PrivateKeyBytes::from_slice(&plaintext).ok_or(ServiceError::Decryption)
    }
}
