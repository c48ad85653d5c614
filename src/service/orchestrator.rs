//! 交易编排器
//!
//! 发送流水线严格按顺序执行：Resolve → Build → Sign → Broadcast。
//! 任一阶段失败都返回带阶段标签的 [`SendError`]，调用方的记录不会被修改，
//! 本地也不缓存 nonce 或已花费输出。

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use super::{
    lifecycle::WalletLifecycleManager,
    network::NetworkHandle,
    transaction_builder::{
        btc,
        eth::{self, EthTransferParams},
        UnsignedTransaction,
    },
};
use crate::{
    domain::{
        transaction::{validate_transfer, Balance, FeeOptions, FeeSpec, TransactionRequest},
        transaction_status::{normalize, StatusReport, TransactionHandle, TxStatus},
        wallet::{KeyState, PrivateKeyBytes, WalletRecord},
    },
    error::{Result, SendError, SendFailure, SendStage, WalletError},
    infrastructure::{
        chain_gateway::ChainBackend,
        log_redact::{redact_address, SensitiveRedact},
    },
    utils::address_validator::AddressValidator,
};

pub struct TransactionOrchestrator {
    handle: NetworkHandle,
    lifecycle: Arc<WalletLifecycleManager>,
}

impl TransactionOrchestrator {
    pub fn new(handle: NetworkHandle, lifecycle: Arc<WalletLifecycleManager>) -> Self {
        Self { handle, lifecycle }
    }

    pub fn handle(&self) -> &NetworkHandle {
        &self.handle
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Send
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 发送交易
    ///
    /// 记录必须处于 `EncryptedKey` 状态，私钥只在本次调用内解密，
    /// 签名后立即销毁。`cancel` 在阶段之间检查。
    pub async fn send(
        &self,
        record: &WalletRecord,
        request: &TransactionRequest,
        password: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<TransactionHandle> {
        let chain = self.handle.chain();

        // ✅ Resolve
        self.check_request(record, request)?;
        tracing::info!(
            chain = %chain,
            from = %redact_address(&record.address),
            request = %request.redact(),
            "Send started"
        );

        let key = self.resolve_key(record, password).await?;
        ensure_not_cancelled(cancel, SendStage::Build)?;

        // ✅ Build
        let unsigned = match self.build(record, request).await {
            Ok(tx) => tx,
            Err(cause) => return Err(self.fail(SendStage::Build, cause)),
        };
        ensure_not_cancelled(cancel, SendStage::Sign)?;

        // ✅ Sign：key 按值移动，函数返回前销毁
        let signed = unsigned
            .sign(key)
            .map_err(|cause| self.fail(SendStage::Sign, cause))?;
        ensure_not_cancelled(cancel, SendStage::Broadcast)?;

        // ✅ Broadcast
        let tx_id = self
            .handle
            .backend()
            .broadcast(&signed.raw_hex)
            .await
            .map_err(|e| self.fail(SendStage::Broadcast, e))?;

        if !tx_id.eq_ignore_ascii_case(&signed.tx_id) {
            tracing::warn!(
                chain = %chain,
                local = %signed.tx_id,
                remote = %tx_id,
                "Gateway returned a different transaction id"
            );
        }

        tracing::info!(chain = %chain, tx_id = %tx_id, "Transaction broadcast");
        Ok(TransactionHandle::pending(tx_id, chain))
    }

    fn fail(&self, stage: SendStage, cause: impl Into<SendFailure>) -> WalletError {
        let err = SendError::new(stage, cause);
        tracing::warn!(
            chain = %self.handle.chain(),
            stage = %stage,
            error = %err.cause,
            "Send failed"
        );
        err.into()
    }

    /// 本地校验，不触发任何网关调用
    fn check_request(&self, record: &WalletRecord, request: &TransactionRequest) -> Result<()> {
        let chain = self.handle.chain();
        let network = self.handle.network();

        if request.chain != chain {
            return Err(WalletError::invalid(format!(
                "request is for {}, orchestrator is bound to {}",
                request.chain, chain
            )));
        }
        request.validate(network)?;

        if record.chain != chain || record.network != network {
            return Err(WalletError::invalid(format!(
                "wallet is bound to {} {}, orchestrator is bound to {} {}",
                record.network, record.chain, network, chain
            )));
        }
        Ok(())
    }

    /// Resolve：把记录的密钥状态变成一次性明文私钥
    async fn resolve_key(
        &self,
        record: &WalletRecord,
        password: Option<&str>,
    ) -> Result<PrivateKeyBytes> {
        match &record.key_state {
            KeyState::Locked => Err(WalletError::invalid(
                "wallet holds no key material and cannot sign",
            )),
            KeyState::PlaintextKey(_) => {
                Err(self.fail(SendStage::Resolve, SendFailure::UnlockedKeyPolicy))
            }
            KeyState::EncryptedKey { .. } => {
                let password = password.ok_or_else(|| {
                    WalletError::invalid("a password is required to send from an encrypted wallet")
                })?;
                self.lifecycle
                    .decrypt_transient(record, password)
                    .await
                    .map_err(|e| match e {
                        WalletError::Unlock(e) => self.fail(SendStage::Resolve, e),
                        WalletError::ServiceUnavailable(e) => {
                            self.fail(SendStage::Resolve, SendFailure::ServiceUnavailable(e))
                        }
                        other => other,
                    })
            }
        }
    }

    /// Build：只读查询网关，构造未签名交易
    async fn build(
        &self,
        record: &WalletRecord,
        request: &TransactionRequest,
    ) -> std::result::Result<UnsignedTransaction, SendFailure> {
        let amount = request.amount_smallest_unit();

        match (self.handle.backend(), request.fee) {
            (ChainBackend::Bitcoin(gateway), FeeSpec::BtcFlat { sats }) => {
                let amount_sats = u64::try_from(amount)
                    .map_err(|_| SendFailure::Build("amount exceeds u64 satoshis".into()))?;
                let utxos = gateway.list_unspent(&record.address).await?;
                tracing::debug!(utxos = utxos.len(), "Fetched spendable outputs");

                let unsigned = btc::build(
                    &utxos,
                    &record.address,
                    &request.to_address,
                    amount_sats,
                    sats,
                    record.address_format,
                    record.network,
                )?;
                Ok(UnsignedTransaction::Bitcoin(unsigned))
            }
            (
                ChainBackend::Ethereum(gateway),
                FeeSpec::EthGas {
                    gas_limit,
                    gas_price_wei,
                },
            ) => {
                let balance = gateway.get_balance(&record.address).await?;
                let needed = amount.saturating_add(request.fee.max_cost());
                if balance < needed {
                    return Err(SendFailure::InsufficientFunds {
                        needed,
                        available: balance,
                    });
                }

                let nonce = gateway.transaction_count(&record.address).await?;
                let chain_id = gateway.chain_id().await?;
                tracing::debug!(nonce, chain_id, "Fetched account state");

                let unsigned = eth::build(
                    &record.address,
                    &request.to_address,
                    EthTransferParams {
                        value_wei: amount,
                        gas_limit,
                        gas_price_wei,
                        nonce,
                        chain_id,
                    },
                )?;
                Ok(UnsignedTransaction::Ethereum(unsigned))
            }
            (backend, fee) => Err(SendFailure::Build(format!(
                "{} fee spec cannot be used on {}",
                fee.chain(),
                backend.chain()
            ))),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 查询
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 查询交易状态；查询失败归为 `Unknown`，不返回错误
    pub async fn query_status(&self, tx_id: &str) -> StatusReport {
        let chain = self.handle.chain();
        let (status, confirmations) = match self.handle.backend().get_transaction(tx_id).await {
            Ok(lookup) => normalize(chain, &lookup),
            Err(e) => {
                tracing::warn!(
                    chain = %chain,
                    tx_id = %tx_id,
                    error = %e,
                    "Transaction lookup failed"
                );
                (TxStatus::Unknown, None)
            }
        };

        tracing::debug!(chain = %chain, tx_id = %tx_id, status = %status, "Transaction status");

        StatusReport {
            tx_id: tx_id.to_string(),
            chain,
            status,
            confirmations,
            checked_at: Utc::now(),
        }
    }

    /// 查询余额
    pub async fn balance(&self, address: &str) -> Result<Balance> {
        let chain = self.handle.chain();
        let address = address.trim();
        if !AddressValidator::validate(chain, self.handle.network(), address) {
            return Err(WalletError::invalid(format!(
                "invalid {} {} address: {}",
                self.handle.network(),
                chain,
                address
            )));
        }

        let value = self.handle.backend().get_balance(address).await?;
        Ok(Balance::new(chain, address, value))
    }

    /// 由用户输入组装转账请求
    ///
    /// 先做与费用无关的本地校验，通过后才补齐费用（可能询问节点）
    pub async fn prepare_request(
        &self,
        to_address: &str,
        amount: Decimal,
        options: FeeOptions,
    ) -> Result<TransactionRequest> {
        let chain = self.handle.chain();
        let network = self.handle.network();
        validate_transfer(chain, network, to_address, amount)?;

        let fee = self.resolve_fee(options).await?;
        TransactionRequest::new(chain, network, to_address, amount, fee)
    }

    /// 补齐费用参数：BTC 默认固定费，ETH 默认 gas limit，gas price 缺省时询问节点
    pub async fn resolve_fee(&self, options: FeeOptions) -> Result<FeeSpec> {
        let defaults = self.handle.fee_defaults();
        match self.handle.backend() {
            ChainBackend::Bitcoin(_) => Ok(FeeSpec::BtcFlat {
                sats: options.btc_fee_sats.unwrap_or(defaults.btc_fee_sats),
            }),
            ChainBackend::Ethereum(gateway) => {
                let gas_limit = options.gas_limit.unwrap_or(defaults.eth_gas_limit);
                let gas_price_wei = match options.gas_price_wei() {
                    Some(price) => price,
                    None => gateway.gas_price().await?,
                };
                Ok(FeeSpec::EthGas {
                    gas_limit,
                    gas_price_wei,
                })
            }
        }
    }
}

fn ensure_not_cancelled(
    cancel: Option<&CancellationToken>,
    next: SendStage,
) -> std::result::Result<(), SendError> {
    match cancel {
        Some(token) if token.is_cancelled() => {
            tracing::info!(stage = %next, "Send cancelled");
            Err(SendError::new(next, SendFailure::Cancelled))
        }
        _ => Ok(()),
    }
}
