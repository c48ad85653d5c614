//! 私钥加密 / 解密
//!
//! Argon2id 从密码派生 256 位密钥，AES-256-GCM 加密私钥。
//! 密文布局：salt(32) | nonce(12) | ciphertext+tag

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::ServiceError;

/// 本地加密方案标识
pub const KDF_LABEL: &str = "argon2id-aes256gcm-v1";

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
/// GCM 认证标签长度
const TAG_LEN: usize = 16;
/// 头部：salt + nonce
const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

/// Argon2id 参数（OWASP 推荐最低值：19 MiB, 2 次迭代, 1 并行度）
const ARGON2_M_COST: u32 = 19_456;
const ARGON2_T_COST: u32 = 2;
const ARGON2_P_COST: u32 = 1;

/// 自动生成密码的随机字节数（十六进制后 32 个字符）
const GENERATED_PASSWORD_BYTES: usize = 16;

/// 加密密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    /// Argon2id 派生
    fn derive(password: &[u8], salt: &[u8]) -> Result<Self, ServiceError> {
        let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
            .map_err(|e| ServiceError::Encryption(format!("invalid argon2 params: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Self { key: [0u8; 32] };
        argon2
            .hash_password_into(password, salt, &mut key.key)
            .map_err(|e| ServiceError::Encryption(format!("key derivation failed: {}", e)))?;
        Ok(key)
    }

    fn cipher(&self) -> Result<Aes256Gcm, ServiceError> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| ServiceError::Encryption(format!("invalid key: {}", e)))
    }
}

/// 生成随机密码（32 个十六进制字符）
pub fn generate_password() -> Zeroizing<String> {
    let mut bytes = Zeroizing::new([0u8; GENERATED_PASSWORD_BYTES]);
    rand::thread_rng().fill_bytes(&mut bytes[..]);
    Zeroizing::new(hex::encode(&bytes[..]))
}

/// 加密数据
///
/// # Arguments
/// * `data` - 要加密的原始数据
/// * `password` - 密码
///
/// # Returns
/// 返回加密后的数据（salt + nonce + ciphertext）
pub fn encrypt_data(data: &[u8], password: &str) -> Result<Vec<u8>, ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::Encryption("password cannot be empty".into()));
    }

    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce_bytes);

    let key = EncryptionKey::derive(password.as_bytes(), &salt)?;
    let ciphertext = key
        .cipher()?
        .encrypt(Nonce::from_slice(&nonce_bytes), data)
        .map_err(|e| ServiceError::Encryption(e.to_string()))?;

    let mut output = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// 解密数据
///
/// 密码错误与密文损坏不做区分，均返回 [`ServiceError::Decryption`]
pub fn decrypt_data(encrypted: &[u8], password: &str) -> Result<Zeroizing<Vec<u8>>, ServiceError> {
    if encrypted.len() < HEADER_LEN + TAG_LEN {
        return Err(ServiceError::Decryption);
    }

    let (salt, rest) = encrypted.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = EncryptionKey::derive(password.as_bytes(), salt)?;
    let plaintext = key
        .cipher()?
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| ServiceError::Decryption)?;

    Ok(Zeroizing::new(plaintext))
}
