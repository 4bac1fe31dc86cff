//! 链上上下文：provider + 本地签名账户。
//!
//! 流水线所需的全部链上能力（读合约、授权、取 nonce、
//! EIP-712 签名、交易签名与广播）都集中在 `ChainContext` 上，
//! 各阶段显式传引用，不依赖全局状态。

use anyhow::{Context, Result, anyhow};
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::dyn_abi::TypedData;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TxSignerSync};
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use serde_json::Value;
use tracing::{debug, info};

sol! {
    #[sol(rpc)]
    contract IErc20 {
        function decimals() external view returns (uint8);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

pub struct ChainContext {
    provider: DynProvider,
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl ChainContext {
    pub fn connect(rpc_url: &str, chain_id: u64, signer: PrivateKeySigner) -> Result<Self> {
        let url: reqwest::Url = rpc_url.parse().context("RPC URL 非法")?;
        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url)
            .erased();
        Ok(Self {
            provider,
            signer,
            chain_id,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub async fn token_decimals(&self, token: Address) -> Result<u8> {
        let decimals = IErc20::new(token, self.provider.clone())
            .decimals()
            .call()
            .await
            .with_context(|| format!("读取 {token} 的 decimals 失败"))?;
        Ok(decimals)
    }

    /// 对 `spender` 授权无上限额度并等待一次确认。
    pub async fn approve_max(&self, token: Address, spender: Address) -> Result<TxHash> {
        info!(target: "chain", %token, %spender, "提交 approve(spender, MAX_UINT256) 交易");
        let receipt = IErc20::new(token, self.provider.clone())
            .approve(spender, U256::MAX)
            .send()
            .await
            .context("approve 交易发送失败")?
            .get_receipt()
            .await
            .context("等待 approve 交易确认失败")?;
        if !receipt.status() {
            return Err(anyhow!("approve 交易回滚: {}", receipt.transaction_hash));
        }
        info!(
            target: "chain",
            tx_hash = %receipt.transaction_hash,
            block = receipt.block_number.unwrap_or_default(),
            "approve 交易已确认"
        );
        Ok(receipt.transaction_hash)
    }

    /// 当前账户 nonce。提交前即取即用，不做缓存。
    pub async fn transaction_count(&self) -> Result<u64> {
        let nonce = self
            .provider
            .get_transaction_count(self.signer.address())
            .await
            .context("读取账户 nonce 失败")?;
        Ok(nonce)
    }

    /// 对 quote 返回的 `permit2.eip712` typed data 签名，产出 65 字节签名。
    pub async fn sign_typed_data(&self, eip712: &Value) -> Result<Bytes> {
        let typed: TypedData =
            serde_json::from_value(eip712.clone()).context("permit2.eip712 不是合法的 typed data")?;
        let signature = self
            .signer
            .sign_dynamic_typed_data(&typed)
            .await
            .context("EIP-712 签名失败")?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }

    /// 组装 legacy 交易，本地签名后广播原始字节。
    ///
    /// quote 缺省的 gas/gasPrice 在这里向节点询价补齐；
    /// 缺省的 value 视为 0，不做臆造。
    pub async fn sign_and_broadcast(
        &self,
        to: Address,
        data: Bytes,
        nonce: u64,
        gas: Option<u64>,
        gas_price: Option<u128>,
        value: Option<U256>,
    ) -> Result<TxHash> {
        let value = value.unwrap_or(U256::ZERO);
        let gas_price = match gas_price {
            Some(price) => price,
            None => self
                .provider
                .get_gas_price()
                .await
                .context("查询 gas price 失败")?,
        };
        let gas_limit = match gas {
            Some(limit) => limit,
            None => {
                let call = TransactionRequest::default()
                    .from(self.signer.address())
                    .to(to)
                    .value(value)
                    .input(TransactionInput::new(data.clone()));
                self.provider
                    .estimate_gas(call)
                    .await
                    .context("估算 gas 失败")?
            }
        };

        let mut tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value,
            input: data,
        };
        debug!(
            target: "chain",
            nonce,
            gas_limit,
            gas_price,
            to = %to,
            "交易组装完成，准备签名广播"
        );

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .context("交易签名失败")?;
        let envelope: TxEnvelope = tx.into_signed(signature).into();
        let raw = envelope.encoded_2718();

        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .context("广播原始交易失败")?;
        Ok(*pending.tx_hash())
    }
}

/// 已知链的区块浏览器交易链接。
pub fn explorer_tx_url(chain_id: u64, hash: &TxHash) -> Option<String> {
    match chain_id {
        1 => Some(format!("https://etherscan.io/tx/{hash}")),
        534352 => Some(format!("https://scrollscan.com/tx/{hash}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    #[test]
    fn explorer_link_known_chains() {
        let hash = b256!("1111111111111111111111111111111111111111111111111111111111111111");
        assert_eq!(
            explorer_tx_url(534352, &hash).as_deref(),
            Some(
                "https://scrollscan.com/tx/0x1111111111111111111111111111111111111111111111111111111111111111"
            )
        );
        assert!(explorer_tx_url(31337, &hash).is_none());
    }
}
