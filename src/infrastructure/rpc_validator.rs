// RPC响应校验模块 - 防止链上数据污染

use crate::error::GatewayError;

fn invalid(msg: impl Into<String>) -> GatewayError {
    GatewayError::InvalidResponse(msg.into())
}

/// 解析 0x 前缀的十六进制数量
fn parse_hex_quantity(value: &str, max_hex_len: usize, what: &str) -> Result<u128, GatewayError> {
    // 移除0x前缀
    let hex = value.trim_start_matches("0x");

    if hex.is_empty() {
        return Err(invalid(format!("{} is empty", what)));
    }
    if hex.len() > max_hex_len {
        return Err(invalid(format!("{} hex string too long: {}", what, hex.len())));
    }

    u128::from_str_radix(hex, 16).map_err(|e| invalid(format!("failed to parse {}: {}", what, e)))
}

/// 验证RPC返回的余额值
pub fn validate_balance(balance_hex: &str) -> Result<u128, GatewayError> {
    let balance = parse_hex_quantity(balance_hex, 32, "balance")?;

    // 上限：10^30 wei（约等于1万亿个以太币）
    const MAX_REASONABLE_BALANCE: u128 = 1_000_000_000_000_000_000_000_000_000_000;
    if balance > MAX_REASONABLE_BALANCE {
        return Err(invalid(format!(
            "balance exceeds reasonable maximum: {}",
            balance
        )));
    }

    Ok(balance)
}

/// 验证RPC返回的nonce值
pub fn validate_nonce(nonce_hex: &str) -> Result<u64, GatewayError> {
    // u64最多16个十六进制字符
    let nonce = parse_hex_quantity(nonce_hex, 16, "nonce")?;
    Ok(nonce as u64)
}

/// 验证RPC返回的区块号 / chain id
pub fn validate_u64(value_hex: &str, what: &str) -> Result<u64, GatewayError> {
    let value = parse_hex_quantity(value_hex, 16, what)?;
    Ok(value as u64)
}

/// 验证RPC返回的gas价格（wei）
pub fn validate_gas_price(gas_price_hex: &str) -> Result<u128, GatewayError> {
    let price = parse_hex_quantity(gas_price_hex, 32, "gas price")?;

    // 上限：100000 gwei
    const MAX_REASONABLE_GAS_PRICE: u128 = 100_000 * 1_000_000_000;
    if price > MAX_REASONABLE_GAS_PRICE {
        return Err(invalid(format!(
            "gas price exceeds reasonable maximum: {}",
            price
        )));
    }

    Ok(price)
}

/// 验证交易哈希格式（32字节 = 64个十六进制字符）
///
/// EVM 哈希返回 0x 前缀形式，BTC txid 不带前缀
pub fn validate_tx_hash(tx_hash: &str, with_prefix: bool) -> Result<String, GatewayError> {
    let hash = tx_hash.trim().trim_start_matches("0x");

    if hash.len() != 64 {
        return Err(invalid(format!(
            "invalid transaction hash length: expected 64, got {}",
            hash.len()
        )));
    }

    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(
            "invalid transaction hash format: contains non-hex characters",
        ));
    }

    let hash = hash.to_lowercase();
    Ok(if with_prefix {
        format!("0x{}", hash)
    } else {
        hash
    })
}

/// 验证JSON-RPC响应并取出 result 字段
///
/// `result` 为 null 时返回 `Ok(None)`（例如尚未打包的收据）
pub fn validate_rpc_response(
    json: &serde_json::Value,
) -> Result<Option<&serde_json::Value>, GatewayError> {
    // 检查是否有error字段
    if let Some(error) = json.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        return Err(GatewayError::Rpc { code, message });
    }

    // 检查jsonrpc版本
    if let Some(version) = json.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            return Err(invalid(format!("unsupported JSON-RPC version: {}", version)));
        }
    }

    match json.get("result") {
        None => Err(invalid("missing result field in RPC response")),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => Ok(Some(v)),
    }
}
