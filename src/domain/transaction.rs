//! 交易请求模型
//!
//! 请求在构造时完成全部本地校验（金额、地址、费用），
//! 校验失败返回 `InvalidRequest`，不会触发任何网关调用。

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    domain::chain_config::{ChainId, Network},
    error::WalletError,
    utils::address_validator::AddressValidator,
};

/// BTC 粉尘阈值（satoshi）
pub const BTC_DUST_LIMIT_SATS: u64 = 546;
/// BTC 默认固定手续费（satoshi）
pub const DEFAULT_BTC_FEE_SATS: u64 = 500;
/// ETH 普通转账默认 gas limit
pub const DEFAULT_ETH_GAS_LIMIT: u64 = 21_000;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// 已确定的费用参数（签名边界上总是具体值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeSpec {
    BtcFlat { sats: u64 },
    EthGas { gas_limit: u64, gas_price_wei: u128 },
}

impl FeeSpec {
    pub fn chain(&self) -> ChainId {
        match self {
            Self::BtcFlat { .. } => ChainId::Btc,
            Self::EthGas { .. } => ChainId::Eth,
        }
    }

    /// 最大手续费（最小单位）
    pub fn max_cost(&self) -> u128 {
        match self {
            Self::BtcFlat { sats } => *sats as u128,
            Self::EthGas {
                gas_limit,
                gas_price_wei,
            } => (*gas_limit as u128).saturating_mul(*gas_price_wei),
        }
    }
}

/// 调用方给出的费用选项，缺省项由编排器补齐
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeOptions {
    /// BTC 固定手续费
    pub btc_fee_sats: Option<u64>,
    /// ETH gas limit
    pub gas_limit: Option<u64>,
    /// ETH gas price（gwei）
    pub gas_price_gwei: Option<u64>,
}

impl FeeOptions {
    pub fn gas_price_wei(&self) -> Option<u128> {
        self.gas_price_gwei
            .map(|gwei| gwei as u128 * WEI_PER_GWEI)
    }
}

/// 转账请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub chain: ChainId,
    pub to_address: String,
    /// 整币单位（BTC / ETH）
    pub amount: Decimal,
    pub fee: FeeSpec,
}

impl TransactionRequest {
    /// 构造并校验转账请求
    pub fn new(
        chain: ChainId,
        network: Network,
        to_address: impl Into<String>,
        amount: Decimal,
        fee: FeeSpec,
    ) -> Result<Self, WalletError> {
        let request = Self {
            chain,
            to_address: to_address.into().trim().to_string(),
            amount,
            fee,
        };
        request.validate(network)?;
        Ok(request)
    }

    /// 本地校验：金额、精度、粉尘、费用、目标地址
    ///
    /// 字段是公开的，编排器在发送前会再次调用
    pub fn validate(&self, network: Network) -> Result<(), WalletError> {
        let chain = self.chain;
        validate_transfer(chain, network, &self.to_address, self.amount)?;

        if self.fee.chain() != chain {
            return Err(WalletError::invalid(format!(
                "fee spec is for {}, request is for {}",
                self.fee.chain(),
                chain
            )));
        }

        if let FeeSpec::EthGas { gas_limit, .. } = self.fee {
            if gas_limit < DEFAULT_ETH_GAS_LIMIT {
                return Err(WalletError::invalid(format!(
                    "gas limit {} is below the {} required for a transfer",
                    gas_limit, DEFAULT_ETH_GAS_LIMIT
                )));
            }
        }

        Ok(())
    }

    /// 金额（最小单位：satoshi / wei）
    pub fn amount_smallest_unit(&self) -> u128 {
        // new() 已校验可表示
        to_smallest_unit(self.amount, self.chain).unwrap_or_default()
    }
}

/// 与费用无关的校验：金额为正、精度、粉尘、目标地址
///
/// 在补齐费用（可能访问网关）之前调用
pub fn validate_transfer(
    chain: ChainId,
    network: Network,
    to_address: &str,
    amount: Decimal,
) -> Result<u128, WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::invalid(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }

    let smallest = to_smallest_unit(amount, chain)?;
    if chain == ChainId::Btc && smallest < BTC_DUST_LIMIT_SATS as u128 {
        return Err(WalletError::invalid(format!(
            "amount {} sats is below the dust limit of {} sats",
            smallest, BTC_DUST_LIMIT_SATS
        )));
    }

    if !AddressValidator::validate(chain, network, to_address.trim()) {
        return Err(WalletError::invalid(format!(
            "invalid {} {} address: {}",
            network, chain, to_address
        )));
    }

    Ok(smallest)
}

/// 余额查询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub chain: ChainId,
    pub address: String,
    /// 最小单位：satoshi / wei
    pub smallest_unit: u128,
    /// 整币单位
    pub display: Decimal,
}

impl Balance {
    pub fn new(chain: ChainId, address: impl Into<String>, smallest_unit: u128) -> Self {
        Self {
            chain,
            address: address.into(),
            smallest_unit,
            display: from_smallest_unit(smallest_unit, chain),
        }
    }
}

/// 整币金额转最小单位，拒绝超出精度的小数位
pub fn to_smallest_unit(amount: Decimal, chain: ChainId) -> Result<u128, WalletError> {
    let decimals = chain.decimals();
    let normalized = amount.normalize();
    if normalized.scale() > decimals {
        return Err(WalletError::invalid(format!(
            "amount {} has more than {} decimal places",
            amount, decimals
        )));
    }
    if normalized.is_sign_negative() {
        return Err(WalletError::invalid("amount must not be negative"));
    }

    // Decimal 尾数最多 96 位，按 u128 整数运算避免溢出
    let mantissa = normalized.mantissa() as u128;
    let factor = 10u128.pow(decimals - normalized.scale());
    mantissa
        .checked_mul(factor)
        .ok_or_else(|| WalletError::invalid(format!("amount {} is too large", amount)))
}

/// 最小单位转整币金额（用于展示）
pub fn from_smallest_unit(value: u128, chain: ChainId) -> Decimal {
    let decimals = chain.decimals();
    match i128::try_from(value)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, decimals).ok())
    {
        Some(d) => d.normalize(),
        None => Decimal::MAX,
    }
}

/// 解析用户输入的金额
pub fn parse_amount(s: &str) -> Result<Decimal, WalletError> {
    Decimal::from_str(s.trim())
        .map_err(|e| WalletError::invalid(format!("invalid amount '{}': {}", s, e)))
}
