//! 钱包会话
//!
//! 一个会话绑定一个网络句柄、至多一个钱包和 BTC 地址格式偏好。
//! 切换网络会替换句柄并丢弃旧钱包（其中的明文私钥随之清零）。

use std::sync::Arc;

use zeroize::Zeroizing;

use super::{
    format_resolver::AddressFormatResolver, lifecycle::WalletLifecycleManager,
    network::NetworkHandle, orchestrator::TransactionOrchestrator,
};
use crate::{
    domain::{
        chain_config::{AddressFormat, ChainId, Network},
        wallet::WalletRecord,
    },
    error::{ReformatError, Result, WalletError},
};

pub struct WalletSession {
    handle: NetworkHandle,
    lifecycle: Arc<WalletLifecycleManager>,
    wallet: Option<WalletRecord>,
    preferred_format: AddressFormat,
}

impl WalletSession {
    pub fn new(handle: NetworkHandle, lifecycle: Arc<WalletLifecycleManager>) -> Self {
        Self {
            handle,
            lifecycle,
            wallet: None,
            preferred_format: AddressFormat::default(),
        }
    }

    pub fn chain(&self) -> ChainId {
        self.handle.chain()
    }

    pub fn network(&self) -> Network {
        self.handle.network()
    }

    pub fn handle(&self) -> &NetworkHandle {
        &self.handle
    }

    pub fn lifecycle(&self) -> &WalletLifecycleManager {
        &self.lifecycle
    }

    pub fn wallet(&self) -> Option<&WalletRecord> {
        self.wallet.as_ref()
    }

    pub fn wallet_mut(&mut self) -> Option<&mut WalletRecord> {
        self.wallet.as_mut()
    }

    pub fn preferred_format(&self) -> AddressFormat {
        self.preferred_format
    }

    /// 生成助记词
    pub async fn generate_mnemonic(&self) -> Result<Zeroizing<String>> {
        self.lifecycle.generate_mnemonic().await
    }

    /// 按会话的链、网络和格式偏好创建钱包，替换当前钱包
    pub async fn create_wallet(&mut self, mnemonic: &str) -> Result<&WalletRecord> {
        let record = self
            .lifecycle
            .create(
                mnemonic,
                self.chain(),
                Some(self.preferred_format),
                self.network(),
            )
            .await?;
        Ok(&*self.wallet.insert(record))
    }

    /// 载入已有记录；链和网络必须与句柄一致
    pub fn load_wallet(&mut self, record: WalletRecord) -> Result<&WalletRecord> {
        if record.chain != self.chain() || record.network != self.network() {
            return Err(WalletError::invalid(format!(
                "wallet is bound to {} {}, session is on {} {}",
                record.network,
                record.chain,
                self.network(),
                self.chain()
            )));
        }
        if record.chain.supports_address_formats() {
            self.preferred_format = record.address_format;
        }
        Ok(&*self.wallet.insert(record))
    }

    /// 切换到新的网络句柄；旧钱包被丢弃
    pub fn switch_network(&mut self, handle: NetworkHandle) -> Result<()> {
        if handle.chain() != self.chain() {
            return Err(WalletError::invalid(format!(
                "cannot switch a {} session to a {} handle",
                self.chain(),
                handle.chain()
            )));
        }

        let dropped = self.wallet.take().is_some();
        tracing::info!(
            chain = %self.chain(),
            from = %self.network(),
            to = %handle.network(),
            dropped_wallet = dropped,
            "Network switched"
        );
        self.handle = handle;
        Ok(())
    }

    /// 设置地址格式：有钱包时按格式切换规则处理，然后更新偏好
    pub fn set_format(&mut self, format: AddressFormat) -> Result<()> {
        if !self.chain().supports_address_formats() {
            return Err(ReformatError::UnsupportedChain(self.chain()).into());
        }
        if let Some(wallet) = self.wallet.as_mut() {
            AddressFormatResolver::reformat(wallet, format)?;
        }
        self.preferred_format = format;
        Ok(())
    }

    /// 绑定当前句柄的编排器
    pub fn orchestrator(&self) -> TransactionOrchestrator {
        TransactionOrchestrator::new(self.handle.clone(), self.lifecycle.clone())
    }
}
