use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::serde_helpers::option_field_as_string;

/// `/swap/permit2/price` 与 `/swap/permit2/quote` 共用的请求参数。
///
/// quote 阶段必须与 price 阶段使用完全相同的一组查询参数，
/// 因此两个端点共享同一个 `to_query_params`。
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub chain_id: u64,
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: U256,
    pub taker: Address,
    pub affiliate_address: Address,
    /// 购买代币百分比费率，例如 "0.01" 表示 1%。
    pub buy_token_percentage_fee: String,
    pub fee_recipient: Address,
}

impl SwapRequest {
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        vec![
            ("chainId".to_string(), self.chain_id.to_string()),
            ("sellToken".to_string(), self.sell_token.to_string()),
            ("buyToken".to_string(), self.buy_token.to_string()),
            ("sellAmount".to_string(), self.sell_amount.to_string()),
            ("taker".to_string(), self.taker.to_string()),
            (
                "affiliateAddress".to_string(),
                self.affiliate_address.to_string(),
            ),
            (
                "buyTokenPercentageFee".to_string(),
                self.buy_token_percentage_fee.clone(),
            ),
            ("feeRecipient".to_string(), self.fee_recipient.to_string()),
        ]
    }
}

/// price 响应中标记 taker 尚未授权 Permit2 的条目。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceIssue {
    pub spender: Address,
    #[serde(default, with = "option_field_as_string")]
    pub actual: Option<U256>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapIssues {
    #[serde(default)]
    pub allowance: Option<AllowanceIssue>,
    #[serde(default)]
    pub balance: Option<Value>,
    #[serde(default)]
    pub simulation_incomplete: Option<bool>,
}

/// 路由中单个流动性来源的占比（基点）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFill {
    pub source: String,
    #[serde(with = "crate::api::serde_helpers::field_as_string")]
    pub proportion_bps: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRoute {
    #[serde(default)]
    pub fills: Vec<RouteFill>,
    #[serde(default)]
    pub tokens: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTax {
    #[serde(with = "crate::api::serde_helpers::field_as_string")]
    pub buy_tax_bps: u32,
    #[serde(with = "crate::api::serde_helpers::field_as_string")]
    pub sell_tax_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub buy_token: TokenTax,
    pub sell_token: TokenTax,
}

/// `/swap/permit2/price` 响应（指示性报价）。
///
/// 仅用于展示与授权决策，收到后不再修改。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    #[serde(default, with = "option_field_as_string")]
    pub buy_amount: Option<U256>,
    #[serde(default, with = "option_field_as_string")]
    pub min_buy_amount: Option<U256>,
    #[serde(default)]
    pub issues: Option<SwapIssues>,
    #[serde(default)]
    pub route: Option<SwapRoute>,
    #[serde(default)]
    pub token_metadata: Option<TokenMetadata>,
    #[serde(default)]
    pub buy_token_percentage_fee: Option<String>,
}

/// quote 返回的可广播交易字段，数值均为十进制字符串且可能缺省。
///
/// `data` 是整条流水线里唯一的原地写入点：
/// permit2 签名拼接后会直接替换该字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTransaction {
    pub to: Address,
    pub data: Bytes,
    #[serde(default, with = "option_field_as_string")]
    pub gas: Option<u64>,
    #[serde(default, with = "option_field_as_string")]
    pub gas_price: Option<u128>,
    #[serde(default, with = "option_field_as_string")]
    pub value: Option<U256>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit2Payload {
    /// EIP-712 typed data 原文，签名时再解析为 `TypedData`。
    #[serde(default)]
    pub eip712: Option<Value>,
}

/// `/swap/permit2/quote` 响应（绑定报价），是 price 信息字段的超集。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(default, with = "option_field_as_string")]
    pub buy_amount: Option<U256>,
    #[serde(default, with = "option_field_as_string")]
    pub min_buy_amount: Option<U256>,
    #[serde(default)]
    pub issues: Option<SwapIssues>,
    #[serde(default)]
    pub route: Option<SwapRoute>,
    #[serde(default)]
    pub token_metadata: Option<TokenMetadata>,
    #[serde(default)]
    pub buy_token_percentage_fee: Option<String>,
    #[serde(default)]
    pub transaction: Option<QuoteTransaction>,
    #[serde(default)]
    pub permit2: Option<Permit2Payload>,
}

impl PriceResponse {
    pub fn try_from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// price 阶段的授权判定只看 `issues.allowance` 是否存在。
    pub fn allowance_issue(&self) -> Option<&AllowanceIssue> {
        self.issues.as_ref().and_then(|issues| issues.allowance.as_ref())
    }
}

impl QuoteResponse {
    pub fn try_from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn permit2_eip712(&self) -> Option<&Value> {
        self.permit2.as_ref().and_then(|permit2| permit2.eip712.as_ref())
    }
}
