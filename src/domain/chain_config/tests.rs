//! 链配置测试

use super::*;

#[test]
fn test_bip44_paths() {
    assert_eq!(ChainId::Eth.derivation_path(), "m/44'/60'/0'/0/0");
    // 所有 BTC 格式共用同一路径
    assert_eq!(ChainId::Btc.derivation_path(), "m/44'/0'/0'/0/0");
}

#[test]
fn test_decimals() {
    assert_eq!(ChainId::Btc.decimals(), 8);
    assert_eq!(ChainId::Eth.decimals(), 18);
}

#[test]
fn test_chain_parse() {
    assert_eq!("btc".parse::<ChainId>().unwrap(), ChainId::Btc);
    assert_eq!("Ethereum".parse::<ChainId>().unwrap(), ChainId::Eth);
    assert!("sol".parse::<ChainId>().is_err());
}

#[test]
fn test_network_mapping() {
    assert_eq!(Network::Mainnet.to_bitcoin(), bitcoin::Network::Bitcoin);
    assert_eq!(Network::Testnet.to_bitcoin(), bitcoin::Network::Testnet);
    assert_eq!("test".parse::<Network>().unwrap(), Network::Testnet);
}

#[test]
fn test_format_witness_mapping() {
    assert_eq!(AddressFormat::Legacy.witness_type().wire_name(), "legacy");
    assert_eq!(AddressFormat::Segwit.witness_type(), WitnessType::SegwitWrapped);
    assert_eq!(AddressFormat::Bech32.witness_type(), WitnessType::SegwitNative);
    assert_eq!(AddressFormat::Bech32.witness_type().wire_name(), "bech32");
}

#[test]
fn test_format_serde_lowercase() {
    let json = serde_json::to_string(&AddressFormat::Segwit).unwrap();
    assert_eq!(json, "\"segwit\"");
    let parsed: AddressFormat = serde_json::from_str("\"bech32\"").unwrap();
    assert_eq!(parsed, AddressFormat::Bech32);
}

#[test]
fn test_only_btc_supports_formats() {
    assert!(ChainId::Btc.supports_address_formats());
    assert!(!ChainId::Eth.supports_address_formats());
}
