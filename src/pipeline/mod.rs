//! quote 到已签名交易的五段流水线。
//!
//! price -> 授权决议 -> quote -> permit 签名与 calldata 拼接 -> 广播。
//! 数据严格单向流动，任何阶段都不会回到更早的阶段。

pub mod calldata;

use alloy::primitives::{Address, Bytes, TxHash};
use anyhow::{Result, bail};
use tracing::{error, info, warn};

use crate::api::swap::QuoteTransaction;
use crate::api::{PriceResponse, QuoteResponse, SwapRequest, ZeroExApiClient};
use crate::chain::{ChainContext, explorer_tx_url};
use crate::display;

use calldata::append_permit2_signature;

/// 授权阶段的判定结果，由 price 响应唯一决定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceAction {
    /// `issues.allowance` 缺省：已有足够授权，跳过。
    Skip,
    /// 需要向报价指定的 spender（Permit2 合约）授权无上限额度。
    Approve { spender: Address },
}

pub fn allowance_action(price: &PriceResponse) -> AllowanceAction {
    match price.allowance_issue() {
        Some(issue) => AllowanceAction::Approve {
            spender: issue.spender,
        },
        None => AllowanceAction::Skip,
    }
}

/// 授权阶段的执行结果。`Failed` 不会让流水线提前返回。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceOutcome {
    /// 无需授权。
    Skipped,
    Approved(TxHash),
    /// approve 失败，soft-fail：只记录，后果推迟到广播阶段。
    Failed,
}

/// 把 approve 的结果映射为值而非错误，流水线据此继续执行。
pub fn approval_outcome(result: Result<TxHash>) -> AllowanceOutcome {
    match result {
        Ok(tx_hash) => {
            info!(target: "pipeline", %tx_hash, "Permit2 授权完成");
            AllowanceOutcome::Approved(tx_hash)
        }
        Err(err) => {
            warn!(
                target: "pipeline",
                error = %err,
                "approve 失败，按 soft-fail 策略继续执行后续阶段"
            );
            AllowanceOutcome::Failed
        }
    }
}

/// 把 permit2 签名拼进 `transaction.data`。
///
/// 仅当 quote 带有 `permit2.eip712` 时才进入拼接分支；此时签名与
/// calldata 缺一即为致命错误，立即终止本次执行（不会走到广播阶段）。
pub fn apply_permit2_signature(
    quote: &mut QuoteResponse,
    signature: Option<&Bytes>,
) -> Result<()> {
    if quote.permit2_eip712().is_none() {
        return Ok(());
    }
    let (Some(signature), Some(transaction)) = (signature, quote.transaction.as_mut()) else {
        bail!("未能获得 permit2 签名或交易 calldata");
    };
    transaction.data = append_permit2_signature(&transaction.data, signature);
    Ok(())
}

/// 广播前的最终守卫：签名与 calldata 必须同时存在。
pub fn broadcast_payload<'q>(
    quote: &'q QuoteResponse,
    signature: Option<&Bytes>,
) -> Result<&'q QuoteTransaction> {
    let (Some(_), Some(transaction)) = (signature, quote.transaction.as_ref()) else {
        bail!("缺少签名或交易数据，不提交交易");
    };
    Ok(transaction)
}

pub struct SwapPipeline<'a> {
    api: &'a ZeroExApiClient,
    chain: &'a ChainContext,
}

impl<'a> SwapPipeline<'a> {
    pub fn new(api: &'a ZeroExApiClient, chain: &'a ChainContext) -> Self {
        Self { api, chain }
    }

    /// 跑完整条流水线：一次 run 对应一笔 swap。
    pub async fn run(&self, request: SwapRequest) -> Result<()> {
        let price = self.fetch_price(&request).await?;
        self.resolve_allowance(&request, &price).await;
        let mut quote = self.fetch_quote(&request).await?;
        display::report_quote(&quote);
        let signature = self.sign_permit(&quote).await;
        apply_permit2_signature(&mut quote, signature.as_ref())?;
        self.submit(&quote, signature.as_ref()).await
    }

    async fn fetch_price(&self, request: &SwapRequest) -> Result<PriceResponse> {
        info!(
            target: "pipeline",
            sell_token = %request.sell_token,
            buy_token = %request.buy_token,
            sell_amount = %request.sell_amount,
            "获取指示性报价（price）"
        );
        let price = self.api.price(request).await?;
        if let Some(buy_amount) = price.buy_amount {
            info!(target: "pipeline", buy_amount = %buy_amount, "price 响应到达");
        }
        Ok(price)
    }

    /// 授权闸门，soft-fail 策略：approve 失败只告警不终止，
    /// 后果推迟到广播阶段由链上回滚暴露。
    async fn resolve_allowance(
        &self,
        request: &SwapRequest,
        price: &PriceResponse,
    ) -> AllowanceOutcome {
        match allowance_action(price) {
            AllowanceAction::Skip => {
                info!(target: "pipeline", token = %request.sell_token, "sell token 已授权 Permit2，跳过 approve");
                AllowanceOutcome::Skipped
            }
            AllowanceAction::Approve { spender } => {
                approval_outcome(self.chain.approve_max(request.sell_token, spender).await)
            }
        }
    }

    async fn fetch_quote(&self, request: &SwapRequest) -> Result<QuoteResponse> {
        info!(target: "pipeline", "获取绑定报价（quote），参数与 price 完全一致");
        let quote = self.api.quote(request).await?;
        Ok(quote)
    }

    /// permit 签名，soft-fail：失败时留空签名，
    /// 由后续的拼接守卫升级为致命错误。
    async fn sign_permit(&self, quote: &QuoteResponse) -> Option<Bytes> {
        let eip712 = quote.permit2_eip712()?;
        match self.chain.sign_typed_data(eip712).await {
            Ok(signature) => {
                info!(
                    target: "pipeline",
                    signature_len = signature.len(),
                    "已签署 quote 返回的 permit2 消息"
                );
                Some(signature)
            }
            Err(err) => {
                error!(target: "pipeline", error = %err, "permit2 消息签名失败");
                None
            }
        }
    }

    async fn submit(&self, quote: &QuoteResponse, signature: Option<&Bytes>) -> Result<()> {
        let transaction = broadcast_payload(quote, signature)?;
        // nonce 即取即用，不缓存也不补偿竞争。
        let nonce = self.chain.transaction_count().await?;
        let tx_hash = self
            .chain
            .sign_and_broadcast(
                transaction.to,
                transaction.data.clone(),
                nonce,
                transaction.gas,
                transaction.gas_price,
                transaction.value,
            )
            .await?;
        info!(target: "pipeline", %tx_hash, "交易已广播");
        if let Some(link) = explorer_tx_url(self.chain.chain_id(), &tx_hash) {
            info!(target: "pipeline", link = %link, "区块浏览器详情");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use serde_json::json;

    fn quote_fixture(with_permit2: bool, with_transaction: bool) -> QuoteResponse {
        let mut value = json!({ "buyAmount": "99" });
        if with_permit2 {
            value["permit2"] = json!({
                "eip712": {
                    "domain": { "name": "Permit2" },
                    "types": {},
                    "primaryType": "PermitTransferFrom",
                    "message": {}
                }
            });
        }
        if with_transaction {
            value["transaction"] = json!({
                "to": "0x2222222222222222222222222222222222222222",
                "data": "0x1234"
            });
        }
        QuoteResponse::try_from_value(value).expect("quote fixture")
    }

    fn signature_of(len: usize) -> Bytes {
        Bytes::from(vec![0xaa; len])
    }

    #[test]
    fn allowance_skip_when_issue_absent() {
        let price = PriceResponse::try_from_value(json!({ "buyAmount": "1" })).expect("price");
        assert_eq!(allowance_action(&price), AllowanceAction::Skip);
    }

    #[test]
    fn allowance_approve_uses_quoted_spender() {
        let price = PriceResponse::try_from_value(json!({
            "issues": { "allowance": { "spender": "0x000000000022d473030f116ddee9f6b43ac78ba3" } }
        }))
        .expect("price");
        assert_eq!(
            allowance_action(&price),
            AllowanceAction::Approve {
                spender: address!("000000000022d473030f116ddee9f6b43ac78ba3")
            }
        );
    }

    #[test]
    fn failed_approval_is_soft_and_pipeline_continues() {
        // approve 失败映射为普通值而非错误，run 不会被 `?` 打断。
        let outcome = approval_outcome(Err(anyhow::anyhow!("insufficient funds for gas")));
        assert_eq!(outcome, AllowanceOutcome::Failed);

        let tx_hash = alloy::primitives::b256!(
            "2222222222222222222222222222222222222222222222222222222222222222"
        );
        assert_eq!(
            approval_outcome(Ok(tx_hash)),
            AllowanceOutcome::Approved(tx_hash)
        );
    }

    #[test]
    fn no_permit_message_leaves_calldata_untouched() {
        let mut quote = quote_fixture(false, true);
        let before = quote.transaction.as_ref().unwrap().data.clone();
        apply_permit2_signature(&mut quote, Some(&signature_of(65))).expect("no-op");
        assert_eq!(quote.transaction.as_ref().unwrap().data, before);
    }

    #[test]
    fn permit_message_with_signature_splices_calldata() {
        let mut quote = quote_fixture(true, true);
        apply_permit2_signature(&mut quote, Some(&signature_of(65))).expect("splice");
        let data = &quote.transaction.as_ref().unwrap().data;
        assert_eq!(data.len(), 2 + 32 + 65);
        assert_eq!(&data[..2], &[0x12, 0x34]);
        assert_eq!(data[2 + 31], 65);
    }

    #[test]
    fn missing_signature_is_fatal_when_permit_present() {
        let mut quote = quote_fixture(true, true);
        assert!(apply_permit2_signature(&mut quote, None).is_err());
    }

    #[test]
    fn missing_transaction_data_is_fatal_when_permit_present() {
        let mut quote = quote_fixture(true, false);
        assert!(apply_permit2_signature(&mut quote, Some(&signature_of(65))).is_err());
    }

    #[test]
    fn broadcast_guard_requires_signature_and_transaction() {
        let quote = quote_fixture(true, true);
        assert!(broadcast_payload(&quote, Some(&signature_of(65))).is_ok());
        assert!(broadcast_payload(&quote, None).is_err());
        let without_tx = quote_fixture(true, false);
        assert!(broadcast_payload(&without_tx, Some(&signature_of(65))).is_err());
    }

    #[test]
    fn end_to_end_assembly_matches_expected_hex() {
        let mut quote = quote_fixture(true, true);
        let signature = signature_of(65);
        apply_permit2_signature(&mut quote, Some(&signature)).expect("splice");
        let transaction = broadcast_payload(&quote, Some(&signature)).expect("guard");
        let rendered = transaction.data.to_string();
        // "0x" + 原始 4 + 前缀 64 + 签名 130 个十六进制字符。
        assert_eq!(rendered.len(), 2 + 4 + 64 + 130);
        assert!(rendered.starts_with("0x1234"));
        assert_eq!(
            &rendered[6..70],
            "0000000000000000000000000000000000000000000000000000000000000041"
        );
    }
}
