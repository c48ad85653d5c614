//! BTC 地址格式切换
//!
//! Legacy → P2PKH，Segwit → P2SH-P2WPKH，Bech32 → P2WPKH。
//! 地址总是由同一私钥重新编码，切回原格式得到原地址。

use crate::{
    domain::{
        chain_config::AddressFormat,
        derivation,
        wallet::{KeyState, WalletRecord},
    },
    error::{ReformatError, Result},
    infrastructure::log_redact::redact_address,
};

pub struct AddressFormatResolver;

impl AddressFormatResolver {
    /// 切换记录的地址格式
    ///
    /// - ETH：不支持
    /// - 格式相同：无操作
    /// - 密文：需先解锁
    /// - 无密钥：只更新格式偏好，地址不变
    /// - 明文：按新格式重新生成地址
    pub fn reformat(record: &mut WalletRecord, new_format: AddressFormat) -> Result<()> {
        if !record.chain.supports_address_formats() {
            return Err(ReformatError::UnsupportedChain(record.chain).into());
        }

        if record.address_format == new_format {
            return Ok(());
        }

        let new_address = match &record.key_state {
            KeyState::EncryptedKey { .. } => {
                return Err(ReformatError::RequiresUnlockedKey.into());
            }
            KeyState::Locked => None,
            KeyState::PlaintextKey(key) => Some(
                derivation::encode_address(key, record.chain, new_format, record.network)
                    .map_err(|e| ReformatError::Encoding(e.to_string()))?,
            ),
        };

        let old_format = record.address_format;
        record.address_format = new_format;
        if let Some(address) = new_address {
            record.address = address;
        }

        tracing::info!(
            from = %old_format,
            to = %new_format,
            address = %redact_address(&record.address),
            "Address format changed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            chain_config::{ChainId, Network},
            wallet::KdfRef,
        },
        error::WalletError,
    };

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn plaintext_btc() -> WalletRecord {
        let key = derivation::derive_private_key(ABANDON, ChainId::Btc).unwrap();
        WalletRecord {
            address: "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA".into(),
            chain: ChainId::Btc,
            network: Network::Mainnet,
            key_state: KeyState::PlaintextKey(key),
            address_format: AddressFormat::Legacy,
        }
    }

    #[test]
    fn test_reformat_round_trip() {
        let mut record = plaintext_btc();
        let original = record.address.clone();

        AddressFormatResolver::reformat(&mut record, AddressFormat::Bech32).unwrap();
        assert!(record.address.starts_with("bc1"));
        assert_eq!(record.address_format, AddressFormat::Bech32);

        AddressFormatResolver::reformat(&mut record, AddressFormat::Segwit).unwrap();
        assert!(record.address.starts_with('3'));

        AddressFormatResolver::reformat(&mut record, AddressFormat::Legacy).unwrap();
        assert_eq!(record.address, original);
    }

    #[test]
    fn test_reformat_same_format_is_noop() {
        let mut record = plaintext_btc();
        AddressFormatResolver::reformat(&mut record, AddressFormat::Legacy).unwrap();
        AddressFormatResolver::reformat(&mut record, AddressFormat::Legacy).unwrap();
        assert_eq!(record.address, "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA");
    }

    #[test]
    fn test_reformat_eth_unsupported() {
        let mut record = WalletRecord::watch_only(
            "0x9858EfFD232B4033E47d90003D23EC58E053e11f",
            ChainId::Eth,
            Network::Mainnet,
            AddressFormat::Legacy,
        );
        let err = AddressFormatResolver::reformat(&mut record, AddressFormat::Bech32).unwrap_err();
        assert!(matches!(
            err,
            WalletError::Reformat(ReformatError::UnsupportedChain(ChainId::Eth))
        ));
    }

    #[test]
    fn test_reformat_encrypted_requires_unlock() {
        let mut record = WalletRecord::from_ciphertext(
            "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA",
            ChainId::Btc,
            Network::Mainnet,
            AddressFormat::Legacy,
            vec![0u8; 60],
            KdfRef("test".into()),
        );
        let err = AddressFormatResolver::reformat(&mut record, AddressFormat::Bech32).unwrap_err();
        assert!(matches!(
            err,
            WalletError::Reformat(ReformatError::RequiresUnlockedKey)
        ));
        assert_eq!(record.address_format, AddressFormat::Legacy);
    }

    #[test]
    fn test_reformat_keyless_updates_preference_only() {
        let mut record = WalletRecord::watch_only(
            "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA",
            ChainId::Btc,
            Network::Mainnet,
            AddressFormat::Legacy,
        );
        AddressFormatResolver::reformat(&mut record, AddressFormat::Bech32).unwrap();
        assert_eq!(record.address_format, AddressFormat::Bech32);
        assert_eq!(record.address, "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA");
    }
}
