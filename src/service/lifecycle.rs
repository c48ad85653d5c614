//! 钱包生命周期管理器
//!
//! 唯一允许在 `PlaintextKey` 与 `EncryptedKey` 之间移动密钥状态的组件。
//! 所有外部服务调用都受超时约束；任何失败都不修改记录。

use std::{future::Future, sync::Arc, time::Duration};

use zeroize::Zeroizing;

use crate::{
    config::ServicesConfig,
    domain::{
        chain_config::{AddressFormat, ChainId, Network},
        derivation,
        wallet::{EncryptionEnvelope, KdfRef, KeyState, PrivateKeyBytes, WalletRecord},
    },
    error::{DerivationError, LockError, Result, ServiceError, UnlockError, WalletError},
    infrastructure::{
        key_service::{
            parse_derivation_response, CoreProcessService, KeyDerivationService,
            KeyEncryptionService, LocalKeyService,
        },
        log_redact::redact_address,
    },
};

pub struct WalletLifecycleManager {
    deriver: Arc<dyn KeyDerivationService>,
    encryptor: Arc<dyn KeyEncryptionService>,
    timeout: Duration,
}

impl WalletLifecycleManager {
    pub fn new(
        deriver: Arc<dyn KeyDerivationService>,
        encryptor: Arc<dyn KeyEncryptionService>,
        timeout: Duration,
    ) -> Self {
        Self {
            deriver,
            encryptor,
            timeout,
        }
    }

    /// 按配置选择密钥服务：配置了 core 可执行文件时走子进程，否则进程内实现
    pub fn from_config(config: &ServicesConfig) -> Self {
        match &config.core_binary {
            Some(binary) => {
                let core = Arc::new(CoreProcessService::new(binary));
                Self::new(core.clone(), core, config.timeout())
            }
            None => {
                let local = Arc::new(LocalKeyService::new());
                Self::new(local.clone(), local, config.timeout())
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 当前加密服务的方案标识，用于导入外部密文
    pub fn kdf(&self) -> KdfRef {
        self.encryptor.kdf()
    }

    /// 带超时执行一次服务调用；超时时 future 被丢弃
    async fn bounded<T, F>(&self, fut: F) -> std::result::Result<T, ServiceError>
    where
        F: Future<Output = std::result::Result<T, ServiceError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ServiceError::Timeout(self.timeout))?
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Create
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 生成 12 词助记词
    pub async fn generate_mnemonic(&self) -> Result<Zeroizing<String>> {
        self.bounded(self.deriver.generate_mnemonic())
            .await
            .map_err(derivation_failure)
    }

    /// 从助记词创建钱包，结果为 `PlaintextKey`
    ///
    /// ETH 忽略 `format`；BTC 缺省为 Legacy
    pub async fn create(
        &self,
        mnemonic: &str,
        chain: ChainId,
        format: Option<AddressFormat>,
        network: Network,
    ) -> Result<WalletRecord> {
        let format = match chain {
            ChainId::Eth => AddressFormat::Legacy,
            ChainId::Btc => format.unwrap_or_default(),
        };

        let response = match chain {
            ChainId::Eth => self.bounded(self.deriver.derive(mnemonic)).await,
            ChainId::Btc => {
                self.bounded(
                    self.deriver
                        .derive_utxo(mnemonic, format.witness_type(), network),
                )
                .await
            }
        }
        .map_err(derivation_failure)?;

        let derived = parse_derivation_response(&response)?;

        // 服务返回的地址必须与本地编码一致
        let expected = derivation::encode_address(&derived.private_key, chain, format, network)?;
        if !same_address(chain, &expected, &derived.address) {
            return Err(DerivationError::MalformedResponse(format!(
                "service address {} does not match key",
                redact_address(&derived.address)
            ))
            .into());
        }

        tracing::info!(
            chain = %chain,
            network = %network,
            format = %format,
            address = %redact_address(&derived.address),
            "Wallet created"
        );

        Ok(WalletRecord {
            address: derived.address,
            chain,
            network,
            key_state: KeyState::PlaintextKey(derived.private_key),
            address_format: format,
        })
    }

    /// 导入私钥（64 位十六进制或 WIF），不经过派生服务
    pub fn import(
        &self,
        secret: &str,
        chain: ChainId,
        format: Option<AddressFormat>,
        network: Network,
    ) -> Result<WalletRecord> {
        let format = match chain {
            ChainId::Eth => AddressFormat::Legacy,
            ChainId::Btc => format.unwrap_or_default(),
        };
        let key = derivation::parse_private_key(secret).ok_or_else(|| {
            DerivationError::InvalidKey("private key is neither 64 hex characters nor WIF".into())
        })?;
        let address = derivation::encode_address(&key, chain, format, network)?;

        tracing::info!(
            chain = %chain,
            address = %redact_address(&address),
            "Wallet imported from private key"
        );

        Ok(WalletRecord {
            address,
            chain,
            network,
            key_state: KeyState::PlaintextKey(key),
            address_format: format,
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Lock / Unlock
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 加密明文私钥
    ///
    /// 成功后记录只持有密文，明文在替换时被清零。未提供密码（或密码为空）时
    /// 由加密服务生成，只在返回的信封中出现一次。
    pub async fn lock(
        &self,
        record: &mut WalletRecord,
        password: Option<&str>,
    ) -> Result<EncryptionEnvelope> {
        let key = match &record.key_state {
            KeyState::PlaintextKey(key) => key,
            KeyState::EncryptedKey { .. } => return Err(LockError::AlreadyEncrypted.into()),
            KeyState::Locked => return Err(LockError::NoKeyMaterial.into()),
        };

        let password = password.filter(|p| !p.is_empty());
        let encrypted = self
            .bounded(self.encryptor.encrypt(key, password))
            .await
            .map_err(|e| {
                if e.is_unavailable() {
                    WalletError::ServiceUnavailable(e)
                } else {
                    LockError::Encryption(e).into()
                }
            })?;

        if encrypted.ciphertext.is_empty() {
            return Err(LockError::Encryption(ServiceError::Encryption(
                "empty ciphertext".into(),
            ))
            .into());
        }

        let (password_reference, generated) = match (encrypted.generated_password, password) {
            (Some(generated), _) => (generated, true),
            (None, Some(given)) => (Zeroizing::new(given.to_string()), false),
            (None, None) => {
                return Err(LockError::Encryption(ServiceError::MalformedResponse(
                    "service generated no password".into(),
                ))
                .into())
            }
        };

        // 旧的 PlaintextKey 在这里被 drop（ZeroizeOnDrop）
        record.key_state = KeyState::EncryptedKey {
            ciphertext: encrypted.ciphertext.clone(),
            kdf: self.encryptor.kdf(),
        };

        tracing::info!(
            chain = %record.chain,
            address = %redact_address(&record.address),
            generated_password = generated,
            "Wallet key encrypted"
        );

        Ok(EncryptionEnvelope {
            ciphertext: encrypted.ciphertext,
            password_reference,
            generated,
        })
    }

    /// 解密并把记录恢复为 `PlaintextKey`，地址不变
    pub async fn unlock(&self, record: &mut WalletRecord, password: &str) -> Result<()> {
        let key = self.decrypt_transient(record, password).await?;
        record.key_state = KeyState::PlaintextKey(key);

        tracing::info!(
            chain = %record.chain,
            address = %redact_address(&record.address),
            "Wallet key decrypted"
        );
        Ok(())
    }

    /// 解密得到一次性私钥，不修改记录
    pub async fn decrypt_transient(
        &self,
        record: &WalletRecord,
        password: &str,
    ) -> Result<PrivateKeyBytes> {
        let ciphertext = match &record.key_state {
            KeyState::EncryptedKey { ciphertext, .. } => ciphertext,
            _ => return Err(UnlockError::NotEncrypted.into()),
        };

        let key = self
            .bounded(self.encryptor.decrypt(ciphertext, password))
            .await
            .map_err(|e| match e {
                e if e.is_unavailable() => WalletError::ServiceUnavailable(e),
                ServiceError::Decryption => UnlockError::Decryption.into(),
                other => UnlockError::Rejected(other).into(),
            })?;

        verify_address(record, &key)?;
        Ok(key)
    }
}

/// 派生服务失败的分类：不可用 / 助记词无效 / 其他拒绝
fn derivation_failure(e: ServiceError) -> WalletError {
    match e {
        e if e.is_unavailable() => WalletError::ServiceUnavailable(e),
        ServiceError::InvalidMnemonic(msg) => DerivationError::InvalidMnemonic(msg).into(),
        ServiceError::MalformedResponse(msg) => DerivationError::MalformedResponse(msg).into(),
        other => DerivationError::Rejected(other).into(),
    }
}

/// ETH 地址大小写只影响校验和，比较时忽略
fn same_address(chain: ChainId, a: &str, b: &str) -> bool {
    match chain {
        ChainId::Eth => a.eq_ignore_ascii_case(b),
        ChainId::Btc => a == b,
    }
}

/// 解密出的私钥必须对应记录中的地址
fn verify_address(
    record: &WalletRecord,
    key: &PrivateKeyBytes,
) -> std::result::Result<(), UnlockError> {
    let actual =
        derivation::encode_address(key, record.chain, record.address_format, record.network)
            .map_err(|_| UnlockError::InvalidKey)?;
    if !same_address(record.chain, &actual, &record.address) {
        return Err(UnlockError::AddressMismatch {
            expected: record.address.clone(),
            actual,
        });
    }
    Ok(())
}
