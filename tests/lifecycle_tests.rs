//! 钱包生命周期集成测试
//!
//! 覆盖：创建、加密 / 解密往返、自动生成密码、失败不修改记录、
//! 地址格式切换、服务超时、会话切换网络

mod common;

use std::{sync::Arc, time::Duration};

use common::*;
use multichain_wallet::{
    domain::{
        chain_config::{AddressFormat, ChainId, Network},
        wallet::{KeyState, WalletRecord},
    },
    error::{DerivationError, LockError, ReformatError, ServiceError, UnlockError, WalletError},
    infrastructure::key_service::LocalKeyService,
    service::{AddressFormatResolver, NetworkHandle, WalletLifecycleManager, WalletSession},
};
use tokio_test::{assert_err, assert_ok};

fn key_hex(record: &WalletRecord) -> String {
    match &record.key_state {
        KeyState::PlaintextKey(key) => key.to_hex().to_string(),
        other => panic!("expected plaintext key, got {}", other.name()),
    }
}

#[tokio::test]
async fn test_create_eth_hardhat_vector() {
    let manager = lifecycle();
    let record = assert_ok!(
        manager
            .create(HARDHAT, ChainId::Eth, None, Network::Mainnet)
            .await
    );
    assert_eq!(record.address, HARDHAT_ADDR);
    assert_eq!(
        key_hex(&record),
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
    );
}

#[tokio::test]
async fn test_create_btc_formats() {
    let manager = lifecycle();
    let legacy = manager
        .create(ABANDON, ChainId::Btc, None, Network::Mainnet)
        .await
        .unwrap();
    assert_eq!(legacy.address, ABANDON_BTC_LEGACY);
    assert_eq!(legacy.address_format, AddressFormat::Legacy);

    let native = manager
        .create(ABANDON, ChainId::Btc, Some(AddressFormat::Bech32), Network::Mainnet)
        .await
        .unwrap();
    assert!(native.address.starts_with("bc1"));

    let testnet = manager
        .create(ABANDON, ChainId::Btc, Some(AddressFormat::Bech32), Network::Testnet)
        .await
        .unwrap();
    assert!(testnet.address.starts_with("tb1"));
}

#[tokio::test]
async fn test_create_rejects_invalid_mnemonic() {
    let err = assert_err!(
        lifecycle()
            .create("not a real mnemonic", ChainId::Eth, None, Network::Mainnet)
            .await
    );
    assert!(matches!(
        err,
        WalletError::Derivation(DerivationError::InvalidMnemonic(_))
    ));
}

#[tokio::test]
async fn test_create_rejects_malformed_service_response() {
    let local = Arc::new(LocalKeyService::new());
    let one_line = Arc::new(ScriptedDeriver(format!("Ethereum Address: {}", HARDHAT_ADDR)));
    let manager = WalletLifecycleManager::new(one_line, local, Duration::from_secs(5));

    let err = manager
        .create(HARDHAT, ChainId::Eth, None, Network::Mainnet)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::Derivation(DerivationError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn test_lock_unlock_round_trip() {
    let manager = lifecycle();
    let mut record = manager
        .create(HARDHAT, ChainId::Eth, None, Network::Mainnet)
        .await
        .unwrap();
    let original_key = key_hex(&record);
    let address = record.address.clone();

    let envelope = manager.lock(&mut record, Some(PASSWORD)).await.unwrap();
    assert!(!envelope.generated);
    assert_eq!(envelope.password_reference.as_str(), PASSWORD);
    assert!(record.key_state.is_encrypted());
    assert_eq!(record.ciphertext(), Some(envelope.ciphertext.as_slice()));
    assert_eq!(record.address, address);

    manager.unlock(&mut record, PASSWORD).await.unwrap();
    assert_eq!(key_hex(&record), original_key);
    assert_eq!(record.address, address);
}

#[tokio::test]
async fn test_lock_generates_password_when_absent() {
    let manager = lifecycle();
    let mut record = manager
        .create(ABANDON, ChainId::Btc, Some(AddressFormat::Bech32), Network::Mainnet)
        .await
        .unwrap();

    let envelope = manager.lock(&mut record, None).await.unwrap();
    assert!(envelope.generated);
    let password = envelope.password_reference.as_str();
    assert_eq!(password.len(), 32);
    assert!(password.chars().all(|c| c.is_ascii_hexdigit()));

    // 空密码等同于未提供
    let mut other = manager
        .create(HARDHAT, ChainId::Eth, None, Network::Mainnet)
        .await
        .unwrap();
    assert!(manager.lock(&mut other, Some("")).await.unwrap().generated);

    manager.unlock(&mut record, password).await.unwrap();
    assert!(record.key_state.is_plaintext());
}

#[tokio::test]
async fn test_second_lock_is_rejected() {
    let manager = lifecycle();
    let mut record = manager
        .create(HARDHAT, ChainId::Eth, None, Network::Mainnet)
        .await
        .unwrap();
    manager.lock(&mut record, Some(PASSWORD)).await.unwrap();
    let ciphertext = record.ciphertext().unwrap().to_vec();

    let err = manager.lock(&mut record, Some("another")).await.unwrap_err();
    assert!(matches!(err, WalletError::Lock(LockError::AlreadyEncrypted)));
    assert_eq!(record.ciphertext().unwrap(), ciphertext.as_slice());
}

#[tokio::test]
async fn test_wrong_password_leaves_record_unchanged() {
    let manager = lifecycle();
    let mut record = manager
        .create(HARDHAT, ChainId::Eth, None, Network::Mainnet)
        .await
        .unwrap();
    manager.lock(&mut record, Some(PASSWORD)).await.unwrap();
    let ciphertext = record.ciphertext().unwrap().to_vec();

    let err = manager.unlock(&mut record, "wrong password").await.unwrap_err();
    assert!(matches!(err, WalletError::Unlock(UnlockError::Decryption)));
    assert!(record.key_state.is_encrypted());
    assert_eq!(record.ciphertext().unwrap(), ciphertext.as_slice());
}

#[tokio::test]
async fn test_unlock_plaintext_is_not_encrypted() {
    let manager = lifecycle();
    let mut record = manager
        .create(HARDHAT, ChainId::Eth, None, Network::Mainnet)
        .await
        .unwrap();
    let err = manager.unlock(&mut record, PASSWORD).await.unwrap_err();
    assert!(matches!(err, WalletError::Unlock(UnlockError::NotEncrypted)));
    assert!(record.key_state.is_plaintext());
}

#[tokio::test]
async fn test_stalled_service_times_out() {
    let stalled = Arc::new(StalledService);
    let manager =
        WalletLifecycleManager::new(stalled.clone(), stalled, Duration::from_millis(50));

    let err = manager
        .create(HARDHAT, ChainId::Eth, None, Network::Mainnet)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::ServiceUnavailable(ServiceError::Timeout(_))
    ));

    // 加密超时不修改记录
    let mut record = lifecycle()
        .create(HARDHAT, ChainId::Eth, None, Network::Mainnet)
        .await
        .unwrap();
    let err = manager.lock(&mut record, Some(PASSWORD)).await.unwrap_err();
    assert!(matches!(err, WalletError::ServiceUnavailable(_)));
    assert!(record.key_state.is_plaintext());
}

#[tokio::test]
async fn test_reformat_after_unlock_round_trip() {
    let manager = lifecycle();
    let mut record = manager
        .create(ABANDON, ChainId::Btc, None, Network::Mainnet)
        .await
        .unwrap();
    manager.lock(&mut record, Some(PASSWORD)).await.unwrap();

    let err = AddressFormatResolver::reformat(&mut record, AddressFormat::Bech32).unwrap_err();
    assert!(matches!(
        err,
        WalletError::Reformat(ReformatError::RequiresUnlockedKey)
    ));

    manager.unlock(&mut record, PASSWORD).await.unwrap();
    AddressFormatResolver::reformat(&mut record, AddressFormat::Bech32).unwrap();
    assert!(record.address.starts_with("bc1"));
    AddressFormatResolver::reformat(&mut record, AddressFormat::Legacy).unwrap();
    assert_eq!(record.address, ABANDON_BTC_LEGACY);
}

#[tokio::test]
async fn test_reformatted_wallet_still_unlocks() {
    let manager = lifecycle();
    let mut record = manager
        .create(ABANDON, ChainId::Btc, None, Network::Mainnet)
        .await
        .unwrap();
    AddressFormatResolver::reformat(&mut record, AddressFormat::Segwit).unwrap();
    let segwit = record.address.clone();

    manager.lock(&mut record, Some(PASSWORD)).await.unwrap();
    manager.unlock(&mut record, PASSWORD).await.unwrap();
    assert_eq!(record.address, segwit);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 会话
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn test_session_format_preference_applies_to_create() {
    let gateway = FakeBitcoinGateway::with_utxos(vec![]);
    let mut session = WalletSession::new(btc_handle(gateway), lifecycle());
    session.set_format(AddressFormat::Bech32).unwrap();
    let record = session.create_wallet(ABANDON).await.unwrap();
    assert!(record.address.starts_with("bc1"));
    assert_eq!(record.address_format, AddressFormat::Bech32);
}

#[tokio::test]
async fn test_session_switch_network_drops_wallet() {
    let gateway = FakeBitcoinGateway::with_utxos(vec![]);
    let mut session = WalletSession::new(btc_handle(gateway), lifecycle());
    session.create_wallet(ABANDON).await.unwrap();
    assert!(session.wallet().is_some());

    let testnet = NetworkHandle::new(
        Network::Testnet,
        multichain_wallet::infrastructure::chain_gateway::ChainBackend::Bitcoin(
            FakeBitcoinGateway::with_utxos(vec![]),
        ),
    );
    session.switch_network(testnet).unwrap();
    assert!(session.wallet().is_none());
    assert_eq!(session.network(), Network::Testnet);

    let record = session.create_wallet(ABANDON).await.unwrap();
    assert!(record.address.starts_with('m') || record.address.starts_with('n'));
}

#[tokio::test]
async fn test_session_rejects_foreign_records() {
    let mut session = WalletSession::new(eth_handle(FakeEthereumGateway::funded(0)), lifecycle());
    let err = session.set_format(AddressFormat::Bech32).unwrap_err();
    assert!(matches!(
        err,
        WalletError::Reformat(ReformatError::UnsupportedChain(ChainId::Eth))
    ));

    let btc = WalletRecord::watch_only(
        ABANDON_BTC_LEGACY,
        ChainId::Btc,
        Network::Mainnet,
        AddressFormat::Legacy,
    );
    assert!(matches!(
        session.load_wallet(btc),
        Err(WalletError::InvalidRequest(_))
    ));
}
