//! Ethereum 交易构建（legacy 交易 + EIP-155 重放保护）

use ethers::{
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, TransactionRequest, U256},
    utils::keccak256,
};

use super::SignedTransaction;
use crate::{domain::wallet::PrivateKeyBytes, error::SendFailure};

/// 未签名 ETH 交易
#[derive(Debug, Clone)]
pub struct UnsignedEthereumTx {
    tx: TypedTransaction,
    from: Address,
    chain_id: u64,
}

pub struct EthTransferParams {
    pub value_wei: u128,
    pub gas_limit: u64,
    pub gas_price_wei: u128,
    pub nonce: u64,
    pub chain_id: u64,
}

fn parse_address(address: &str) -> Result<Address, SendFailure> {
    address
        .parse::<Address>()
        .map_err(|e| SendFailure::Build(format!("invalid address {}: {}", address, e)))
}

/// 构建 legacy 转账交易
pub fn build(
    from_address: &str,
    to_address: &str,
    params: EthTransferParams,
) -> Result<UnsignedEthereumTx, SendFailure> {
    let from = parse_address(from_address)?;
    let to = parse_address(to_address)?;

    let request = TransactionRequest::new()
        .from(from)
        .to(to)
        .value(U256::from(params.value_wei))
        .gas(params.gas_limit)
        .gas_price(U256::from(params.gas_price_wei))
        .nonce(params.nonce)
        .chain_id(params.chain_id);

    Ok(UnsignedEthereumTx {
        tx: TypedTransaction::Legacy(request),
        from,
        chain_id: params.chain_id,
    })
}

impl UnsignedEthereumTx {
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn nonce(&self) -> Option<U256> {
        self.tx.nonce().copied()
    }

    pub fn sign(self, key: PrivateKeyBytes) -> Result<SignedTransaction, SendFailure> {
        let wallet = LocalWallet::from_bytes(key.as_bytes())
            .map_err(|e| SendFailure::Signing(format!("invalid secret key: {}", e)))?
            .with_chain_id(self.chain_id);
        drop(key);

        if wallet.address() != self.from {
            return Err(SendFailure::Signing(
                "key does not control the source address".into(),
            ));
        }

        let signature = wallet
            .sign_transaction_sync(&self.tx)
            .map_err(|e| SendFailure::Signing(e.to_string()))?;
        drop(wallet);

        let raw = self.tx.rlp_signed(&signature);
        let hash = keccak256(&raw);

        Ok(SignedTransaction {
            raw_hex: format!("0x{}", hex::encode(&raw)),
            tx_id: format!("0x{}", hex::encode(hash)),
        })
    }
}
