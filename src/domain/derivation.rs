//! 密钥派生与地址编码
//!
//! 地址是 `(私钥, 地址格式, 网络)` 的纯函数：创建、解锁校验、格式切换
//! 都通过 [`encode_address`] 计算地址，保证三处结果一致。

use bip39::{Language, Mnemonic};
use coins_bip32::path::DerivationPath;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::{
    domain::{
        chain_config::{AddressFormat, ChainId, Network},
        wallet::PrivateKeyBytes,
    },
    error::DerivationError,
};

/// 生成 BIP39 英文助记词
pub fn generate_mnemonic(word_count: usize) -> Result<Zeroizing<String>, DerivationError> {
    let entropy_bytes = match word_count {
        12 => 16, // 128 bits = 12 words
        24 => 32, // 256 bits = 24 words
        n => {
            return Err(DerivationError::InvalidMnemonic(format!(
                "invalid word count {}, must be 12 or 24",
                n
            )))
        }
    };

    let mut entropy = Zeroizing::new(vec![0u8; entropy_bytes]);
    rand::thread_rng().fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| DerivationError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// 按链的 BIP44 路径从助记词派生私钥
pub fn derive_private_key(
    mnemonic: &str,
    chain: ChainId,
) -> Result<PrivateKeyBytes, DerivationError> {
    use coins_bip32::prelude::*;
    use k256::ecdsa::SigningKey;

    // 解析助记词
    let mnemonic = Mnemonic::parse_in(Language::English, mnemonic.trim())
        .map_err(|e| DerivationError::InvalidMnemonic(e.to_string()))?;

    // 生成种子
    let seed = Zeroizing::new(mnemonic.to_seed(""));

    let derivation_path = chain
        .derivation_path()
        .parse::<DerivationPath>()
        .map_err(|e| DerivationError::InvalidKey(format!("invalid derivation path: {}", e)))?;

    let master_key = XPriv::root_from_seed(&seed[..], None)
        .map_err(|e| DerivationError::InvalidKey(format!("master key: {}", e)))?;

    let derived_key = master_key
        .derive_path(&derivation_path)
        .map_err(|e| DerivationError::InvalidKey(format!("child key: {}", e)))?;

    // XPriv 实现 AsRef<SigningKey>
    let signing_key: &SigningKey = derived_key.as_ref();
    let mut bytes: [u8; 32] = signing_key.to_bytes().into();
    let key = PrivateKeyBytes::new(bytes);
    bytes.zeroize();
    Ok(key)
}

/// 计算钱包地址
///
/// ETH 忽略 `format` 与 `network`，返回 EIP-55 校验和地址
pub fn encode_address(
    key: &PrivateKeyBytes,
    chain: ChainId,
    format: AddressFormat,
    network: Network,
) -> Result<String, DerivationError> {
    match chain {
        ChainId::Eth => ethereum_address(key),
        ChainId::Btc => bitcoin_address(key, format, network),
    }
}

/// Ethereum 地址：Keccak256(未压缩公钥) 后 20 字节
pub fn ethereum_address(key: &PrivateKeyBytes) -> Result<String, DerivationError> {
    use k256::ecdsa::SigningKey;
    use sha3::{Digest, Keccak256};

    let signing_key = SigningKey::from_slice(key.as_bytes())
        .map_err(|e| DerivationError::InvalidKey(e.to_string()))?;
    let public_key = signing_key.verifying_key().to_encoded_point(false); // 未压缩格式
    let public_key_slice = &public_key.as_bytes()[1..]; // 去掉 0x04 前缀

    let hash = Keccak256::digest(public_key_slice);
    let address = ethers::types::Address::from_slice(&hash[12..]);
    Ok(ethers::utils::to_checksum(&address, None))
}

/// Bitcoin 地址：压缩公钥按格式编码
pub fn bitcoin_address(
    key: &PrivateKeyBytes,
    format: AddressFormat,
    network: Network,
) -> Result<String, DerivationError> {
    use bitcoin::Address;

    let public_key = bitcoin_public_key(key)?;
    let network = network.to_bitcoin();

    let address = match format {
        AddressFormat::Legacy => Address::p2pkh(&public_key, network),
        AddressFormat::Segwit => Address::p2shwpkh(&public_key, network)
            .map_err(|e| DerivationError::InvalidKey(e.to_string()))?,
        AddressFormat::Bech32 => Address::p2wpkh(&public_key, network)
            .map_err(|e| DerivationError::InvalidKey(e.to_string()))?,
    };
    Ok(address.to_string())
}

/// 压缩格式的 Bitcoin 公钥
pub fn bitcoin_public_key(key: &PrivateKeyBytes) -> Result<bitcoin::PublicKey, DerivationError> {
    use bitcoin::secp256k1::{Secp256k1, SecretKey};

    let secp = Secp256k1::signing_only();
    let secret_key = SecretKey::from_slice(key.as_bytes())
        .map_err(|e| DerivationError::InvalidKey(e.to_string()))?;
    let public_key = bitcoin::PublicKey::new(secret_key.public_key(&secp));
    Ok(public_key)
}

/// 解析派生服务返回的私钥：64 位十六进制或 WIF
pub fn parse_private_key(value: &str) -> Option<PrivateKeyBytes> {
    if let Some(key) = PrivateKeyBytes::from_hex(value) {
        return Some(key);
    }
    let wif = bitcoin::PrivateKey::from_wif(value.trim()).ok()?;
    let bytes = Zeroizing::new(wif.inner.secret_bytes());
    PrivateKeyBytes::from_slice(bytes.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const HARDHAT: &str = "test test test test test test test test test test test junk";

    #[test]
    fn test_ethereum_derivation_bip39_vector() {
        let key = derive_private_key(ABANDON, ChainId::Eth).unwrap();
        let address = ethereum_address(&key).unwrap();
        assert_eq!(address, "0x9858EfFD232B4033E47d90003D23EC58E053e11f");
    }

    #[test]
    fn test_ethereum_derivation_hardhat_vector() {
        let key = derive_private_key(HARDHAT, ChainId::Eth).unwrap();
        assert_eq!(
            key.to_hex().as_str(),
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        );
        assert_eq!(
            ethereum_address(&key).unwrap(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_bitcoin_legacy_bip44_vector() {
        let key = derive_private_key(ABANDON, ChainId::Btc).unwrap();
        let address = bitcoin_address(&key, AddressFormat::Legacy, Network::Mainnet).unwrap();
        assert_eq!(address, "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA");
    }

    #[test]
    fn test_bitcoin_format_prefixes() {
        let key = derive_private_key(ABANDON, ChainId::Btc).unwrap();

        let segwit = bitcoin_address(&key, AddressFormat::Segwit, Network::Mainnet).unwrap();
        assert!(segwit.starts_with('3'));

        let bech32 = bitcoin_address(&key, AddressFormat::Bech32, Network::Mainnet).unwrap();
        assert!(bech32.starts_with("bc1q"));

        let testnet = bitcoin_address(&key, AddressFormat::Bech32, Network::Testnet).unwrap();
        assert!(testnet.starts_with("tb1q"));
    }

    #[test]
    fn test_encode_address_is_deterministic() {
        let key = derive_private_key(ABANDON, ChainId::Btc).unwrap();
        for format in AddressFormat::ALL {
            let a = encode_address(&key, ChainId::Btc, format, Network::Mainnet).unwrap();
            let b = encode_address(&key, ChainId::Btc, format, Network::Mainnet).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_invalid_mnemonic_rejected() {
        let err = derive_private_key("not a valid mnemonic", ChainId::Eth).unwrap_err();
        assert!(matches!(err, DerivationError::InvalidMnemonic(_)));
    }

    #[test]
    fn test_parse_private_key_hex_and_wif() {
        let key = derive_private_key(ABANDON, ChainId::Btc).unwrap();
        let hex_form = key.to_hex();
        assert_eq!(parse_private_key(&hex_form).unwrap(), key);

        let secret = bitcoin::secp256k1::SecretKey::from_slice(key.as_bytes()).unwrap();
        let wif = bitcoin::PrivateKey::new(secret, bitcoin::Network::Bitcoin).to_wif();
        assert_eq!(parse_private_key(&wif).unwrap(), key);

        assert!(parse_private_key("garbage").is_none());
    }

    #[test]
    fn test_generate_mnemonic_word_counts() {
        let m12 = generate_mnemonic(12).unwrap();
        assert_eq!(m12.split_whitespace().count(), 12);
        assert!(derive_private_key(&m12, ChainId::Eth).is_ok());

        let m24 = generate_mnemonic(24).unwrap();
        assert_eq!(m24.split_whitespace().count(), 24);

        assert!(generate_mnemonic(15).is_err());
    }
}
