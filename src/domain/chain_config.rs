//! 链与网络配置
//!
//! 定义支持的两条链（BTC / ETH）、网络（主网 / 测试网）以及 BTC 地址格式

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// 支持的链
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    /// Bitcoin（UTXO 模型）
    Btc,
    /// Ethereum（账户模型）
    Eth,
}

impl ChainId {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eth => "ETH",
        }
    }

    /// 最小单位的小数位数（satoshi / wei）
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Btc => 8,
            Self::Eth => 18,
        }
    }

    /// BIP44 派生路径（account 0, change 0, index 0）
    ///
    /// 所有 BTC 地址格式共用 m/44'/0'/0'/0/0，格式只影响地址编码
    pub fn derivation_path(&self) -> &'static str {
        match self {
            Self::Btc => "m/44'/0'/0'/0/0",
            Self::Eth => "m/44'/60'/0'/0/0",
        }
    }

    /// 是否支持地址格式切换
    pub fn supports_address_formats(&self) -> bool {
        matches!(self, Self::Btc)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ChainId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(Self::Btc),
            "eth" | "ethereum" => Ok(Self::Eth),
            _ => Err(format!("unsupported chain: {} (use btc or eth)", s)),
        }
    }
}

/// 网络
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }

    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            Self::Mainnet => bitcoin::Network::Bitcoin,
            Self::Testnet => bitcoin::Network::Testnet,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            _ => Err(format!("unknown network: {} (use mainnet or testnet)", s)),
        }
    }
}

/// BTC 地址格式
///
/// ETH 记录固定携带 `Legacy`，该值对 ETH 无意义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    /// P2PKH（1...）
    #[default]
    Legacy,
    /// P2SH 包裹的 P2WPKH（3...）
    Segwit,
    /// 原生 P2WPKH（bc1q...）
    Bech32,
}

impl AddressFormat {
    pub const ALL: [AddressFormat; 3] = [Self::Legacy, Self::Segwit, Self::Bech32];

    /// 传给派生服务的 witness 参数
    pub fn witness_type(&self) -> WitnessType {
        match self {
            Self::Legacy => WitnessType::Legacy,
            Self::Segwit => WitnessType::SegwitWrapped,
            Self::Bech32 => WitnessType::SegwitNative,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Segwit => "segwit",
            Self::Bech32 => "bech32",
        }
    }
}

impl fmt::Display for AddressFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" | "p2pkh" => Ok(Self::Legacy),
            "segwit" | "p2sh-p2wpkh" => Ok(Self::Segwit),
            "bech32" | "native" | "p2wpkh" => Ok(Self::Bech32),
            _ => Err(format!(
                "unknown address format: {} (use legacy, segwit or bech32)",
                s
            )),
        }
    }
}

/// 派生服务的 witness 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WitnessType {
    Legacy,
    SegwitWrapped,
    SegwitNative,
}

impl WitnessType {
    /// 派生服务命令行参数名
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::SegwitWrapped => "segwit",
            Self::SegwitNative => "bech32",
        }
    }
}

#[cfg(test)]
mod tests;
