//! 地址验证模块
//!
//! 统一的地址验证逻辑：ETH 支持 EIP-55 校验和，BTC 校验 Base58Check / Bech32
//! 以及地址所属网络

use std::str::FromStr;

use crate::domain::chain_config::{AddressFormat, ChainId, Network};

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证地址格式
    ///
    /// # 参数
    /// - `chain`: 链
    /// - `network`: 网络（BTC 地址前缀依赖网络）
    /// - `address`: 待验证的地址
    pub fn validate(chain: ChainId, network: Network, address: &str) -> bool {
        match chain {
            ChainId::Eth => Self::validate_evm_address(address),
            ChainId::Btc => Self::validate_bitcoin_address(address, network),
        }
    }

    /// 验证EVM地址（支持EIP-55 Checksum）
    fn validate_evm_address(address: &str) -> bool {
        // 1. 基本格式检查
        if !address.starts_with("0x") || address.len() != 42 {
            return false;
        }

        // 2. 验证hex字符
        let hex_part = &address[2..];
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 3. 混合大小写时按 EIP-55 校验；全小写或全大写不带校验和
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            return Self::verify_eip55_checksum(address);
        }

        true
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(address: &str) -> bool {
        use sha3::{Digest, Keccak256};

        let addr_lower = address[2..].to_lowercase();
        let hash = Keccak256::digest(addr_lower.as_bytes());

        for (i, ch) in address[2..].chars().enumerate() {
            if ch.is_alphabetic() {
                let hash_byte = hash[i / 2];
                let hash_nibble = if i % 2 == 0 {
                    hash_byte >> 4
                } else {
                    hash_byte & 0x0f
                };

                let should_be_uppercase = hash_nibble >= 8;
                if ch.is_uppercase() != should_be_uppercase {
                    return false;
                }
            }
        }

        true
    }

    /// 验证Bitcoin地址（完整校验和 + 网络匹配）
    fn validate_bitcoin_address(address: &str, network: Network) -> bool {
        match bitcoin::Address::from_str(address) {
            Ok(unchecked) => unchecked.require_network(network.to_bitcoin()).is_ok(),
            Err(_) => false,
        }
    }

    /// 识别 BTC 地址格式
    ///
    /// P2SH 地址无法区分是否包裹了 P2WPKH，本钱包只生成包裹形式，按 Segwit 处理
    pub fn detect_bitcoin_format(address: &str, network: Network) -> Option<AddressFormat> {
        use bitcoin::AddressType;

        let address = bitcoin::Address::from_str(address)
            .ok()?
            .require_network(network.to_bitcoin())
            .ok()?;
        match address.address_type()? {
            AddressType::P2pkh => Some(AddressFormat::Legacy),
            AddressType::P2sh => Some(AddressFormat::Segwit),
            AddressType::P2wpkh => Some(AddressFormat::Bech32),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm_address_validation() {
        // 有效地址（全小写 - 无checksum，总是通过）
        assert!(AddressValidator::validate(
            ChainId::Eth,
            Network::Mainnet,
            "0x742d35cc6634c0532925a3b844bc9e7595f0beb6"
        ));

        // EIP-55 校验和地址
        assert!(AddressValidator::validate(
            ChainId::Eth,
            Network::Mainnet,
            "0x9858EfFD232B4033E47d90003D23EC58E053e11f"
        ));

        // 校验和错误
        assert!(!AddressValidator::validate(
            ChainId::Eth,
            Network::Mainnet,
            "0x9858efFD232B4033E47d90003D23EC58E053e11f"
        ));

        // 无效地址
        assert!(!AddressValidator::validate(ChainId::Eth, Network::Mainnet, "0x123"));
        assert!(!AddressValidator::validate(
            ChainId::Eth,
            Network::Mainnet,
            "742d35Cc6634C0532925a3b844Bc9e7595f0bEb6"
        ));
        assert!(!AddressValidator::validate(
            ChainId::Eth,
            Network::Mainnet,
            "0xGGGG35Cc6634C0532925a3b844Bc9e7595f0bEb6"
        ));
    }

    #[test]
    fn test_bitcoin_address_validation() {
        // P2PKH地址
        assert!(AddressValidator::validate(
            ChainId::Btc,
            Network::Mainnet,
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        ));

        // P2SH地址
        assert!(AddressValidator::validate(
            ChainId::Btc,
            Network::Mainnet,
            "3J98t1WpEZ73CNmYviecrnyiWrnqRhWNLy"
        ));

        // Bech32地址
        assert!(AddressValidator::validate(
            ChainId::Btc,
            Network::Mainnet,
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"
        ));

        // 网络不匹配
        assert!(!AddressValidator::validate(
            ChainId::Btc,
            Network::Testnet,
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"
        ));

        // 校验和错误
        assert!(!AddressValidator::validate(
            ChainId::Btc,
            Network::Mainnet,
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNb"
        ));

        assert!(!AddressValidator::validate(ChainId::Btc, Network::Mainnet, "invalid"));
    }

    #[test]
    fn test_detect_bitcoin_format() {
        assert_eq!(
            AddressValidator::detect_bitcoin_format(
                "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
                Network::Mainnet
            ),
            Some(AddressFormat::Legacy)
        );
        assert_eq!(
            AddressValidator::detect_bitcoin_format(
                "3J98t1WpEZ73CNmYviecrnyiWrnqRhWNLy",
                Network::Mainnet
            ),
            Some(AddressFormat::Segwit)
        );
        assert_eq!(
            AddressValidator::detect_bitcoin_format(
                "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq",
                Network::Mainnet
            ),
            Some(AddressFormat::Bech32)
        );
        assert_eq!(
            AddressValidator::detect_bitcoin_format("garbage", Network::Mainnet),
            None
        );
    }
}
