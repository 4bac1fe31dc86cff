//! 配置与密钥加载。
//!
//! 非敏感参数走 TOML 配置文件（缺省时内置默认值），
//! 三个密钥（私钥、0x API key、RPC 地址）只从环境变量读取，
//! 启动时校验，缺一即致命，且发生在任何网络请求之前。

mod loader;

use alloy::primitives::{Address, address};
use serde::Deserialize;

pub use loader::{ConfigError, DEFAULT_CONFIG_PATHS, load_config};

/// Scroll 主网默认参数：WETH -> wstETH。
pub const DEFAULT_CHAIN_ID: u64 = 534352;
const SCROLL_WETH: Address = address!("5300000000000000000000000000000000000004");
const SCROLL_WSTETH: Address = address!("f610A9dfB7C89644979B4A0f27063E9e7D7CDA32");

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MagellanConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub swap: SwapConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// 可覆盖环境变量里的 RPC 地址，便于本地 fork 调试。
    #[serde(default)]
    pub rpc_url: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            rpc_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwapConfig {
    #[serde(default = "default_sell_token")]
    pub sell_token: Address,
    #[serde(default = "default_buy_token")]
    pub buy_token: Address,
    /// 卖出数量，按代币展示单位书写（如 "0.1"）。
    #[serde(default = "default_sell_amount")]
    pub sell_amount: String,
    /// 联盟费率小数（"0.01" = 1%）。
    #[serde(default = "default_fee_fraction")]
    pub buy_token_percentage_fee: String,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            sell_token: default_sell_token(),
            buy_token: default_buy_token(),
            sell_amount: default_sell_amount(),
            buy_token_percentage_fee: default_fee_fraction(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_base_url() -> String {
    "https://api.0x.org".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_sell_token() -> Address {
    SCROLL_WETH
}

fn default_buy_token() -> Address {
    SCROLL_WSTETH
}

fn default_sell_amount() -> String {
    "0.1".to_string()
}

fn default_fee_fraction() -> String {
    "0.01".to_string()
}

pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";
pub const ENV_ZEROEX_API_KEY: &str = "ZERO_EX_API_KEY";
pub const ENV_RPC_URL: &str = "ALCHEMY_HTTP_TRANSPORT_URL";

#[derive(Debug, Clone)]
pub struct Secrets {
    pub private_key: String,
    pub api_key: String,
    pub rpc_url: String,
}

impl Secrets {
    /// 从环境变量装载。`rpc_override` 来自配置文件，优先生效。
    pub fn from_env(rpc_override: Option<&str>) -> Result<Self, ConfigError> {
        Self::resolve(rpc_override, |name| std::env::var(name).ok())
    }

    fn resolve(
        rpc_override: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let private_key = require(&lookup, ENV_PRIVATE_KEY)?;
        let api_key = require(&lookup, ENV_ZEROEX_API_KEY)?;
        let rpc_url = match rpc_override {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => require(&lookup, ENV_RPC_URL)?,
        };
        Ok(Self {
            private_key,
            api_key,
            rpc_url,
        })
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingEnv { name }),
    }
}
