//! Bitcoin 交易构建
//!
//! 输入选择：已确认优先，同类按金额从大到小，直到覆盖 `金额 + 手续费`。
//! 找零不低于粉尘阈值时回到源地址，否则并入手续费。

use std::str::FromStr;

use bitcoin::{
    absolute::LockTime,
    ecdsa,
    hashes::Hash,
    script::PushBytesBuf,
    secp256k1::{Message, Secp256k1, SecretKey},
    sighash::{EcdsaSighashType, SighashCache},
    transaction::Version,
    Address, Amount, OutPoint, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};

use super::SignedTransaction;
use crate::{
    domain::{
        chain_config::{AddressFormat, Network},
        transaction::BTC_DUST_LIMIT_SATS,
        wallet::PrivateKeyBytes,
    },
    error::SendFailure,
    infrastructure::chain_gateway::Utxo,
};

/// 未签名 BTC 交易
#[derive(Debug, Clone)]
pub struct UnsignedBitcoinTx {
    tx: Transaction,
    /// 与 `tx.input` 一一对应的被花费输出
    spent: Vec<Utxo>,
    source_script: ScriptBuf,
    format: AddressFormat,
    pub fee_sats: u64,
    pub change_sats: Option<u64>,
}

/// 输入选择结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub inputs: Vec<Utxo>,
    pub total: u64,
}

/// 选择输入：已确认优先，然后按金额降序
pub fn select_utxos(utxos: &[Utxo], target: u64) -> Result<Selection, SendFailure> {
    let mut candidates: Vec<&Utxo> = utxos.iter().collect();
    candidates.sort_by(|a, b| {
        b.confirmed
            .cmp(&a.confirmed)
            .then_with(|| b.value.cmp(&a.value))
    });

    let mut inputs = Vec::new();
    let mut total: u64 = 0;
    for utxo in candidates {
        if total >= target {
            break;
        }
        total = total.saturating_add(utxo.value);
        inputs.push(utxo.clone());
    }

    if total < target {
        return Err(SendFailure::InsufficientFunds {
            needed: target as u128,
            available: total as u128,
        });
    }

    Ok(Selection { inputs, total })
}

fn parse_address(address: &str, network: Network) -> Result<Address, SendFailure> {
    Address::from_str(address)
        .map_err(|e| SendFailure::Build(format!("invalid address {}: {}", address, e)))?
        .require_network(network.to_bitcoin())
        .map_err(|e| SendFailure::Build(format!("address {} on wrong network: {}", address, e)))
}

/// 构建未签名交易
pub fn build(
    utxos: &[Utxo],
    from_address: &str,
    to_address: &str,
    amount_sats: u64,
    fee_sats: u64,
    format: AddressFormat,
    network: Network,
) -> Result<UnsignedBitcoinTx, SendFailure> {
    let source = parse_address(from_address, network)?;
    let destination = parse_address(to_address, network)?;

    let target = amount_sats
        .checked_add(fee_sats)
        .ok_or_else(|| SendFailure::Build("amount plus fee overflows".into()))?;
    let selection = select_utxos(utxos, target)?;

    let input = selection
        .inputs
        .iter()
        .map(|utxo| {
            let txid = Txid::from_str(&utxo.txid)
                .map_err(|e| SendFailure::Build(format!("invalid utxo txid: {}", e)))?;
            Ok(TxIn {
                previous_output: OutPoint::new(txid, utxo.vout),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            })
        })
        .collect::<Result<Vec<_>, SendFailure>>()?;

    let mut output = vec![TxOut {
        value: Amount::from_sat(amount_sats),
        script_pubkey: destination.script_pubkey(),
    }];

    let change = selection.total - target;
    let (fee_sats, change_sats) = if change >= BTC_DUST_LIMIT_SATS {
        output.push(TxOut {
            value: Amount::from_sat(change),
            script_pubkey: source.script_pubkey(),
        });
        (fee_sats, Some(change))
    } else {
        (fee_sats + change, None)
    };

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output,
    };

    Ok(UnsignedBitcoinTx {
        tx,
        spent: selection.inputs,
        source_script: source.script_pubkey(),
        format,
        fee_sats,
        change_sats,
    })
}

impl UnsignedBitcoinTx {
    pub fn input_count(&self) -> usize {
        self.tx.input.len()
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.tx.output
    }

    /// 按地址格式签名每个输入
    pub fn sign(self, key: PrivateKeyBytes) -> Result<SignedTransaction, SendFailure> {
        let secp = Secp256k1::signing_only();
        let mut secret = SecretKey::from_slice(key.as_bytes())
            .map_err(|e| SendFailure::Signing(format!("invalid secret key: {}", e)))?;
        drop(key);

        let result = self.sign_with(&secp, &secret);
        secret.non_secure_erase();
        result
    }

    fn sign_with(
        self,
        secp: &Secp256k1<bitcoin::secp256k1::SignOnly>,
        secret: &SecretKey,
    ) -> Result<SignedTransaction, SendFailure> {
        let public_key = PublicKey::new(secret.public_key(secp));
        let pubkey_hash = public_key.pubkey_hash();
        let wpubkey_hash = public_key.wpubkey_hash();

        // 私钥必须控制源地址
        let (expected_script, witness_program) = match self.format {
            AddressFormat::Legacy => (ScriptBuf::new_p2pkh(&pubkey_hash), None),
            AddressFormat::Segwit | AddressFormat::Bech32 => {
                let wpkh = wpubkey_hash.ok_or_else(|| {
                    SendFailure::Signing("segwit requires a compressed key".into())
                })?;
                let witness_program = ScriptBuf::new_p2wpkh(&wpkh);
                if self.format == AddressFormat::Segwit {
                    (
                        ScriptBuf::new_p2sh(&witness_program.script_hash()),
                        Some(witness_program),
                    )
                } else {
                    (witness_program.clone(), Some(witness_program))
                }
            }
        };
        if expected_script != self.source_script {
            return Err(SendFailure::Signing(
                "key does not control the source address".into(),
            ));
        }

        let signatures = {
            let mut cache = SighashCache::new(&self.tx);
            let mut signatures = Vec::with_capacity(self.spent.len());
            for (index, utxo) in self.spent.iter().enumerate() {
                let digest = match &witness_program {
                    None => cache
                        .legacy_signature_hash(
                            index,
                            &self.source_script,
                            EcdsaSighashType::All.to_u32(),
                        )
                        .map_err(|e| SendFailure::Signing(format!("sighash: {}", e)))?
                        .to_byte_array(),
                    Some(program) => cache
                        .p2wpkh_signature_hash(
                            index,
                            program,
                            Amount::from_sat(utxo.value),
                            EcdsaSighashType::All,
                        )
                        .map_err(|e| SendFailure::Signing(format!("sighash: {}", e)))?
                        .to_byte_array(),
                };
                let message = Message::from_digest(digest);
                let sig = secp.sign_ecdsa(&message, secret);
                signatures.push(ecdsa::Signature::sighash_all(sig));
            }
            signatures
        };

        let mut tx = self.tx;
        for (txin, signature) in tx.input.iter_mut().zip(signatures) {
            let sig_bytes = PushBytesBuf::try_from(signature.to_vec())
                .map_err(|e| SendFailure::Signing(format!("signature push: {}", e)))?;
            match self.format {
                AddressFormat::Legacy => {
                    txin.script_sig = ScriptBuf::builder()
                        .push_slice(sig_bytes)
                        .push_key(&public_key)
                        .into_script();
                }
                AddressFormat::Segwit | AddressFormat::Bech32 => {
                    let mut witness = Witness::new();
                    witness.push(signature.to_vec());
                    witness.push(public_key.to_bytes());
                    txin.witness = witness;

                    // P2SH-P2WPKH 的 scriptSig 只压入见证程序
                    if let Some(redeem) = witness_program
                        .as_ref()
                        .filter(|_| self.format == AddressFormat::Segwit)
                    {
                        let redeem_bytes = PushBytesBuf::try_from(redeem.to_bytes())
                            .map_err(|e| SendFailure::Signing(format!("redeem push: {}", e)))?;
                        txin.script_sig =
                            ScriptBuf::builder().push_slice(redeem_bytes).into_script();
                    }
                }
            }
        }

        Ok(SignedTransaction {
            raw_hex: bitcoin::consensus::encode::serialize_hex(&tx),
            tx_id: tx.txid().to_string(),
        })
    }
}
