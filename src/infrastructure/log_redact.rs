//! 日志脱敏
//!
//! 私钥、助记词、密码、密文一律不进日志；地址与原始交易只显示首尾

use serde::Serialize;

use crate::domain::transaction::TransactionRequest;

/// 可脱敏trait
pub trait SensitiveRedact {
    fn redact(&self) -> String;
}

/// 脱敏十六进制字符串（显示前缀和后缀）
pub fn redact_hex_string(hex: &str, show_chars: usize) -> String {
    if hex.len() <= show_chars * 2 {
        return "*".repeat(hex.len());
    }

    let prefix = &hex[..show_chars];
    let suffix = &hex[hex.len() - show_chars..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return "*".repeat(address.len());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

/// 转账请求脱敏
#[derive(Debug, Serialize)]
struct RedactedTransactionRequest {
    chain: &'static str,
    to: String,
    amount: String,
}

impl SensitiveRedact for TransactionRequest {
    fn redact(&self) -> String {
        serde_json::to_string(&RedactedTransactionRequest {
            chain: self.chain.symbol(),
            to: redact_address(&self.to_address),
            amount: self.amount.to_string(),
        })
        .unwrap_or_else(|_| "{ redacted }".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_address() {
        assert_eq!(
            redact_address("0x9858EfFD232B4033E47d90003D23EC58E053e11f"),
            "0x9858...e11f"
        );
        assert_eq!(redact_address("short"), "*****");
    }

    #[test]
    fn test_redact_hex_string() {
        assert_eq!(redact_hex_string("0123456789abcdef", 4), "0123...cdef");
        assert_eq!(redact_hex_string("abcd", 4), "****");
    }

    #[test]
    fn test_redact_request() {
        use crate::domain::{
            chain_config::{ChainId, Network},
            transaction::FeeSpec,
        };
        use rust_decimal::Decimal;
        use std::str::FromStr;

        let req = TransactionRequest::new(
            ChainId::Eth,
            Network::Mainnet,
            "0x9858EfFD232B4033E47d90003D23EC58E053e11f",
            Decimal::from_str("0.25").unwrap(),
            FeeSpec::EthGas {
                gas_limit: 21_000,
                gas_price_wei: 1,
            },
        )
        .unwrap();
        let text = req.redact();
        assert!(text.contains("0x9858...e11f"));
        assert!(!text.contains("EfFD232B"));
        assert!(text.contains("0.25"));
    }
}
