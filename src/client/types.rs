/// JSON-RPC payload types for the subset of the Solana API the analysis reads.
///
/// Every field the analysis does not strictly need is optional so that a
/// partial or malformed transaction deserializes and is skipped later by the
/// extractor instead of failing the whole wallet.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub block_time: Option<i64>,
    #[serde(default)]
    pub err: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub block_time: Option<i64>,
    pub meta: Option<TransactionMeta>,
    pub transaction: Option<TransactionBody>,
}

impl RawTransaction {
    /// Account keys in message order, whether encoded as strings or parsed objects.
    pub fn account_keys(&self) -> Vec<&str> {
        self.transaction
            .as_ref()
            .map(|t| t.message.account_keys.iter().map(AccountKey::pubkey).collect())
            .unwrap_or_default()
    }

    pub fn is_failed(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.err.as_ref())
            .map(|e| !e.is_null())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    pub post_token_balances: Option<Vec<TokenBalance>>,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub account_index: Option<u32>,
    pub mint: Option<String>,
    pub owner: Option<String>,
    pub ui_token_amount: Option<UiTokenAmount>,
}

impl TokenBalance {
    pub fn ui_amount(&self) -> Option<f64> {
        self.ui_token_amount.as_ref().and_then(|a| a.ui_amount)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    pub ui_amount: Option<f64>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionBody {
    #[serde(default)]
    pub message: Message,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub account_keys: Vec<AccountKey>,
}

/// `json` encoding yields plain strings, `jsonParsed` yields objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountKey {
    Plain(String),
    Parsed { pubkey: String },
}

impl AccountKey {
    pub fn pubkey(&self) -> &str {
        match self {
            AccountKey::Plain(key) => key,
            AccountKey::Parsed { pubkey } => pubkey,
        }
    }
}

/// One entry of `getTokenLargestAccounts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LargestAccount {
    pub address: String,
    pub ui_amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueWrapper<T> {
    pub value: T,
}

/// Base58 string that decodes to a 32-byte public key.
pub fn is_valid_address(address: &str) -> bool {
    matches!(bs58::decode(address).into_vec(), Ok(bytes) if bytes.len() == 32)
}

/// A transaction paired with the signature it was fetched by.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletTransaction {
    pub signature: String,
    /// Block time from the signature listing, used when the transaction lacks one.
    pub listed_block_time: Option<i64>,
    pub tx: RawTransaction,
}

impl WalletTransaction {
    pub fn block_time(&self) -> Option<i64> {
        self.tx.block_time.or(self.listed_block_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parsed_transaction_deserializes() {
        let raw = json!({
            "blockTime": 1_700_000_000,
            "meta": {
                "err": null,
                "preBalances": [5_000_000_000u64, 0],
                "postBalances": [4_000_000_000u64, 1_000_000_000u64],
                "preTokenBalances": [],
                "postTokenBalances": [{
                    "accountIndex": 2,
                    "mint": "MintA",
                    "owner": "Wallet1",
                    "uiTokenAmount": {"uiAmount": 12.5, "amount": "12500000", "decimals": 6}
                }]
            },
            "transaction": {
                "message": {
                    "accountKeys": [
                        {"pubkey": "Funder", "signer": true, "writable": true},
                        "Wallet1"
                    ]
                }
            }
        });

        let tx: RawTransaction = serde_json::from_value(raw).unwrap();
        assert_eq!(tx.block_time, Some(1_700_000_000));
        assert!(!tx.is_failed());
        assert_eq!(tx.account_keys(), vec!["Funder", "Wallet1"]);
        let post = &tx.meta.as_ref().unwrap().post_token_balances.as_ref().unwrap()[0];
        assert_eq!(post.ui_amount(), Some(12.5));
        assert_eq!(post.account_index, Some(2));
    }

    #[test]
    fn test_failed_transaction_detected() {
        let tx: RawTransaction = serde_json::from_value(json!({
            "blockTime": 1,
            "meta": {"err": {"InstructionError": [0, "Custom"]}}
        }))
        .unwrap();
        assert!(tx.is_failed());
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("So11111111111111111111111111111111111111112"));
        assert!(is_valid_address("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        assert!(!is_valid_address("not-base58-0OIl"));
        assert!(!is_valid_address("abc"));
    }

    #[test]
    fn test_missing_fields_tolerated() {
        let tx: RawTransaction = serde_json::from_value(json!({})).unwrap();
        assert!(tx.meta.is_none());
        assert!(tx.account_keys().is_empty());
    }
}
