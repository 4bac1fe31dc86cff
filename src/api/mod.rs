//! 0x Swap API v2 封装。

pub mod serde_helpers;
pub mod sources;
pub mod swap;

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

pub use sources::SourcesResponse;
pub use swap::{PriceResponse, QuoteResponse, SwapRequest};

#[derive(Debug, Error)]
pub enum ZeroExError {
    #[error("0x API 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("请求 {endpoint} 超时（{timeout_ms}ms）")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("响应解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("请求 {endpoint} 返回状态 {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("请求 {endpoint} 被限流，状态 {status}: {body}")]
    RateLimited {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("0x 响应结构不符合预期: {0}")]
    Schema(String),
    #[error("API key 不是合法的 header 值")]
    InvalidApiKey,
}

#[derive(Clone, Debug)]
pub struct ZeroExApiClient {
    base_url: String,
    client: reqwest::Client,
    headers: HeaderMap,
    request_timeout: Duration,
}

impl ZeroExApiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        api_key: &str,
        request_timeout_ms: u64,
    ) -> Result<Self, ZeroExError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "0x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| ZeroExError::InvalidApiKey)?,
        );
        headers.insert("0x-version", HeaderValue::from_static("v2"));
        Ok(Self {
            base_url,
            client,
            headers,
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }

    /// 列出链上可用的流动性来源。
    pub async fn sources(&self, chain_id: u64) -> Result<SourcesResponse, ZeroExError> {
        let params = vec![("chainId".to_string(), chain_id.to_string())];
        let value = self.get_json("/swap/v1/sources", "sources", &params).await?;
        SourcesResponse::try_from_value(value).map_err(|err| ZeroExError::Schema(err.to_string()))
    }

    /// 指示性报价（monetized price）。
    pub async fn price(&self, request: &SwapRequest) -> Result<PriceResponse, ZeroExError> {
        let params = request.to_query_params();
        let value = self.get_json("/swap/permit2/price", "price", &params).await?;
        PriceResponse::try_from_value(value).map_err(|err| ZeroExError::Schema(err.to_string()))
    }

    /// 绑定报价。参数必须与 price 请求逐项一致，因此直接复用
    /// 同一个 `SwapRequest`。
    pub async fn quote(&self, request: &SwapRequest) -> Result<QuoteResponse, ZeroExError> {
        let params = request.to_query_params();
        let value = self.get_json("/swap/permit2/quote", "quote", &params).await?;
        QuoteResponse::try_from_value(value).map_err(|err| ZeroExError::Schema(err.to_string()))
    }

    async fn get_json(
        &self,
        path: &str,
        stage: &'static str,
        params: &[(String, String)],
    ) -> Result<Value, ZeroExError> {
        let url = self.endpoint(path);
        let started = Instant::now();
        trace!(target: "zeroex", stage, endpoint = %url, params = ?params, "发起 0x API 请求");

        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .timeout(self.request_timeout)
            .query(params)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    let timeout_ms = self.request_timeout.as_millis() as u64;
                    warn!(target: "zeroex", stage, endpoint = %url, timeout_ms, "0x API 请求超时");
                    ZeroExError::Timeout {
                        endpoint: url.clone(),
                        timeout_ms,
                        source: err,
                    }
                } else {
                    warn!(target: "zeroex", stage, endpoint = %url, error = %err, "0x API 请求发送失败");
                    ZeroExError::from(err)
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            warn!(target: "zeroex", stage, endpoint = %url, error = %err, "读取 0x API 响应失败");
            ZeroExError::from(err)
        })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let summary = summarize_error_body(body);
            warn!(
                target: "zeroex",
                stage,
                endpoint = %url,
                status = status.as_u16(),
                body = %summary,
                "0x API 命中限流"
            );
            return Err(ZeroExError::RateLimited {
                endpoint: url,
                status,
                body: summary,
            });
        }

        if !status.is_success() {
            let summary = summarize_error_body(body);
            warn!(
                target: "zeroex",
                stage,
                endpoint = %url,
                status = status.as_u16(),
                body = %summary,
                "0x API 返回非 200 状态"
            );
            return Err(ZeroExError::ApiStatus {
                endpoint: url,
                status,
                body: summary,
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|err| {
            warn!(target: "zeroex", stage, endpoint = %url, error = %err, "0x API JSON 解析失败");
            ZeroExError::Json(err)
        })?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        debug!(
            target: "zeroex",
            stage,
            endpoint = %url,
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            raw = %value,
            "0x API 请求完成"
        );
        Ok(value)
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn summarize_error_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let mut single_line = trimmed.replace(['\n', '\r'], " ");
    const MAX_LEN: usize = 512;
    if single_line.len() > MAX_LEN {
        // 截断点必须落在字符边界上，响应体是外部输入，可能含多字节字符。
        let mut cut = MAX_LEN;
        while !single_line.is_char_boundary(cut) {
            cut -= 1;
        }
        single_line.truncate(cut);
        single_line.push('…');
    }
    single_line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = ZeroExApiClient::new(
            reqwest::Client::new(),
            "https://api.0x.org/".to_string(),
            "test-key",
            5_000,
        )
        .expect("client");
        assert_eq!(
            client.endpoint("/swap/permit2/price"),
            "https://api.0x.org/swap/permit2/price"
        );
    }

    #[test]
    fn error_body_is_single_line_and_capped() {
        let summary = summarize_error_body("line one\nline two".to_string());
        assert_eq!(summary, "line one line two");
        let long = summarize_error_body("x".repeat(600));
        assert!(long.chars().count() <= 513);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn multibyte_body_truncates_on_char_boundary() {
        // 第 512 字节落在 'é' 的两个字节之间，截断需回退到字符边界。
        let mut body = "x".repeat(511);
        body.push('é');
        body.push_str(&"y".repeat(100));
        let summary = summarize_error_body(body);
        assert!(summary.len() <= 512 + '…'.len_utf8());
        assert!(summary.ends_with('…'));
        assert!(summary.starts_with(&"x".repeat(511)));
    }

    #[test]
    fn empty_error_body_is_labelled() {
        assert_eq!(summarize_error_body("  ".to_string()), "(empty response body)");
    }
}
