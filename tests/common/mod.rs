//! 测试辅助模块
//! 提供内存网关、可控密钥服务和常用构造函数

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use multichain_wallet::{
    domain::{
        chain_config::{ChainId, Network, WitnessType},
        transaction_status::TxLookup,
        wallet::{KdfRef, PrivateKeyBytes},
    },
    error::{GatewayError, ServiceError},
    infrastructure::{
        chain_gateway::{BitcoinGateway, ChainBackend, ChainGateway, EthereumGateway, Utxo},
        key_service::{EncryptedKey, KeyDerivationService, KeyEncryptionService, LocalKeyService},
    },
    service::{NetworkHandle, WalletLifecycleManager},
};
use zeroize::Zeroizing;

pub const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const HARDHAT: &str = "test test test test test test test test test test test junk";
pub const HARDHAT_ADDR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const ABANDON_ETH_ADDR: &str = "0x9858EfFD232B4033E47d90003D23EC58E053e11f";
pub const ABANDON_BTC_LEGACY: &str = "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA";
pub const BTC_DEST: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
pub const FUNDING_TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
pub const BROADCAST_TXID: &str = "0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098";
pub const PASSWORD: &str = "correct horse battery staple";

/// 使用进程内密钥服务的生命周期管理器
pub fn lifecycle() -> Arc<WalletLifecycleManager> {
    let local = Arc::new(LocalKeyService::new());
    Arc::new(WalletLifecycleManager::new(
        local.clone(),
        local,
        Duration::from_secs(30),
    ))
}

pub fn btc_handle(gateway: Arc<FakeBitcoinGateway>) -> NetworkHandle {
    NetworkHandle::new(Network::Mainnet, ChainBackend::Bitcoin(gateway))
}

pub fn eth_handle(gateway: Arc<FakeEthereumGateway>) -> NetworkHandle {
    NetworkHandle::new(Network::Mainnet, ChainBackend::Ethereum(gateway))
}

pub fn utxo(vout: u32, value: u64, confirmed: bool) -> Utxo {
    Utxo {
        txid: FUNDING_TXID.to_string(),
        vout,
        value,
        confirmed,
    }
}

fn injected_failure() -> GatewayError {
    GatewayError::Rpc {
        code: -26,
        message: "injected failure".into(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 内存网关
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 内存 BTC 网关，记录每次调用
#[derive(Default)]
pub struct FakeBitcoinGateway {
    pub utxos: Mutex<Vec<Utxo>>,
    pub balance: Mutex<u128>,
    pub lookup: Mutex<Option<TxLookup>>,
    pub fail_broadcast: Mutex<bool>,
    /// 余额查询返回超时
    pub timed_out: Mutex<bool>,
    pub broadcasts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeBitcoinGateway {
    pub fn with_utxos(utxos: Vec<Utxo>) -> Arc<Self> {
        let gateway = Self::default();
        *gateway.utxos.lock().unwrap() = utxos;
        Arc::new(gateway)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainGateway for FakeBitcoinGateway {
    fn chain(&self) -> ChainId {
        ChainId::Btc
    }

    async fn get_balance(&self, _address: &str) -> Result<u128, GatewayError> {
        self.hit();
        if *self.timed_out.lock().unwrap() {
            return Err(GatewayError::Timeout);
        }
        Ok(*self.balance.lock().unwrap())
    }

    async fn broadcast(&self, raw_tx: &str) -> Result<String, GatewayError> {
        self.hit();
        if *self.fail_broadcast.lock().unwrap() {
            return Err(injected_failure());
        }
        self.broadcasts.lock().unwrap().push(raw_tx.to_string());
        Ok(BROADCAST_TXID.to_string())
    }

    async fn get_transaction(&self, _tx_id: &str) -> Result<TxLookup, GatewayError> {
        self.hit();
        self.lookup
            .lock()
            .unwrap()
            .clone()
            .ok_or(GatewayError::Timeout)
    }
}

#[async_trait]
impl BitcoinGateway for FakeBitcoinGateway {
    async fn list_unspent(&self, _address: &str) -> Result<Vec<Utxo>, GatewayError> {
        self.hit();
        Ok(self.utxos.lock().unwrap().clone())
    }
}

/// 内存 ETH 网关
pub struct FakeEthereumGateway {
    pub balance: Mutex<u128>,
    pub nonce: u64,
    pub chain_id: u64,
    pub gas_price: u128,
    pub lookup: Mutex<Option<TxLookup>>,
    pub fail_broadcast: Mutex<bool>,
    /// 余额与 gas price 查询返回超时
    pub timed_out: Mutex<bool>,
    pub broadcasts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeEthereumGateway {
    pub fn funded(balance_wei: u128) -> Arc<Self> {
        Arc::new(Self {
            balance: Mutex::new(balance_wei),
            nonce: 3,
            chain_id: 1,
            gas_price: 15_000_000_000,
            lookup: Mutex::new(None),
            fail_broadcast: Mutex::new(false),
            timed_out: Mutex::new(false),
            broadcasts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainGateway for FakeEthereumGateway {
    fn chain(&self) -> ChainId {
        ChainId::Eth
    }

    async fn get_balance(&self, _address: &str) -> Result<u128, GatewayError> {
        self.hit();
        if *self.timed_out.lock().unwrap() {
            return Err(GatewayError::Timeout);
        }
        Ok(*self.balance.lock().unwrap())
    }

    async fn broadcast(&self, raw_tx: &str) -> Result<String, GatewayError> {
        self.hit();
        if *self.fail_broadcast.lock().unwrap() {
            return Err(injected_failure());
        }
        self.broadcasts.lock().unwrap().push(raw_tx.to_string());
        Ok(format!("0x{}", BROADCAST_TXID))
    }

    async fn get_transaction(&self, _tx_id: &str) -> Result<TxLookup, GatewayError> {
        self.hit();
        self.lookup
            .lock()
            .unwrap()
            .clone()
            .ok_or(GatewayError::Timeout)
    }
}

#[async_trait]
impl EthereumGateway for FakeEthereumGateway {
    async fn transaction_count(&self, _address: &str) -> Result<u64, GatewayError> {
        self.hit();
        Ok(self.nonce)
    }

    async fn chain_id(&self) -> Result<u64, GatewayError> {
        self.hit();
        Ok(self.chain_id)
    }

    async fn gas_price(&self) -> Result<u128, GatewayError> {
        self.hit();
        if *self.timed_out.lock().unwrap() {
            return Err(GatewayError::Timeout);
        }
        Ok(self.gas_price)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 可控密钥服务
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 永不返回的服务，用于超时测试
pub struct StalledService;

#[async_trait]
impl KeyDerivationService for StalledService {
    async fn derive(&self, _mnemonic: &str) -> Result<Zeroizing<String>, ServiceError> {
        std::future::pending().await
    }

    async fn derive_utxo(
        &self,
        _mnemonic: &str,
        _witness: WitnessType,
        _network: Network,
    ) -> Result<Zeroizing<String>, ServiceError> {
        std::future::pending().await
    }

    async fn generate_mnemonic(&self) -> Result<Zeroizing<String>, ServiceError> {
        std::future::pending().await
    }
}

#[async_trait]
impl KeyEncryptionService for StalledService {
    fn kdf(&self) -> KdfRef {
        KdfRef("stalled".into())
    }

    async fn encrypt(
        &self,
        _key: &PrivateKeyBytes,
        _password: Option<&str>,
    ) -> Result<EncryptedKey, ServiceError> {
        std::future::pending().await
    }

    async fn decrypt(
        &self,
        _ciphertext: &[u8],
        _password: &str,
    ) -> Result<PrivateKeyBytes, ServiceError> {
        std::future::pending().await
    }
}

/// 返回固定文本的派生服务
pub struct ScriptedDeriver(pub String);

#[async_trait]
impl KeyDerivationService for ScriptedDeriver {
    async fn derive(&self, _mnemonic: &str) -> Result<Zeroizing<String>, ServiceError> {
        Ok(Zeroizing::new(self.0.clone()))
    }

    async fn derive_utxo(
        &self,
        _mnemonic: &str,
        _witness: WitnessType,
        _network: Network,
    ) -> Result<Zeroizing<String>, ServiceError> {
        Ok(Zeroizing::new(self.0.clone()))
    }

    async fn generate_mnemonic(&self) -> Result<Zeroizing<String>, ServiceError> {
        Ok(Zeroizing::new(HARDHAT.to_string()))
    }
}
