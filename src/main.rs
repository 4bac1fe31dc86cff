use std::path::PathBuf;
use std::str::FromStr;

use alloy::primitives::{Address, U256, utils::parse_units};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

mod api;
mod chain;
mod config;
mod display;
mod pipeline;

use api::{SwapRequest, ZeroExApiClient};
use chain::ChainContext;
use config::{MagellanConfig, Secrets, load_config};
use pipeline::SwapPipeline;

#[derive(Parser, Debug)]
#[command(name = "magellan", version, about = "0x Permit2 swap 演示工具")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 magellan.toml 或 config/magellan.toml）"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 执行一次 Permit2 swap 流水线（默认 WETH -> wstETH）
    Swap(SwapCmd),
    /// 列出当前链上可用的流动性来源
    Sources,
}

#[derive(Args, Debug)]
struct SwapCmd {
    #[arg(long, help = "卖出代币合约地址（默认 Scroll WETH）")]
    sell_token: Option<Address>,
    #[arg(long, help = "买入代币合约地址（默认 Scroll wstETH）")]
    buy_token: Option<Address>,
    #[arg(long, help = "卖出数量，按代币展示单位书写（如 0.1）")]
    sell_amount: Option<String>,
    #[arg(long, help = "联盟费率小数（如 0.01 表示 1%）")]
    fee: Option<String>,
    #[arg(long, help = "跳过启动时的流动性来源列举")]
    skip_sources: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone())?;
    init_tracing(&config.logging);

    // 密钥校验先于任何网络请求，缺失即终止。
    dotenv::dotenv().ok();
    let secrets = Secrets::from_env(config.chain.rpc_url.as_deref())?;
    let signer =
        PrivateKeySigner::from_str(&secrets.private_key).context("PRIVATE_KEY 不是合法的私钥")?;

    let chain = ChainContext::connect(&secrets.rpc_url, config.chain.chain_id, signer)?;
    let api = ZeroExApiClient::new(
        reqwest::Client::new(),
        config.api.base_url.clone(),
        &secrets.api_key,
        config.api.request_timeout_ms,
    )?;
    info!(
        target: "magellan",
        taker = %chain.address(),
        chain_id = chain.chain_id(),
        "启动完成"
    );

    match cli.command {
        Command::Sources => {
            let sources = api.sources(chain.chain_id()).await?;
            display::report_sources(chain.chain_id(), &sources);
            Ok(())
        }
        Command::Swap(cmd) => run_swap(&config, &api, &chain, cmd).await,
    }
}

async fn run_swap(
    config: &MagellanConfig,
    api: &ZeroExApiClient,
    chain: &ChainContext,
    cmd: SwapCmd,
) -> Result<()> {
    if !cmd.skip_sources {
        let sources = api.sources(chain.chain_id()).await?;
        display::report_sources(chain.chain_id(), &sources);
    }

    let request = build_swap_request(config, chain, &cmd).await?;
    info!(
        target: "magellan",
        sell_amount = %cmd.sell_amount.as_deref().unwrap_or(&config.swap.sell_amount),
        sell_token = %request.sell_token,
        buy_token = %request.buy_token,
        "开始执行 swap 流水线"
    );

    SwapPipeline::new(api, chain).run(request).await
}

/// 从配置与命令行覆盖拼出请求参数；卖出数量按链上 decimals 换算。
async fn build_swap_request(
    config: &MagellanConfig,
    chain: &ChainContext,
    cmd: &SwapCmd,
) -> Result<SwapRequest> {
    let sell_token = cmd.sell_token.unwrap_or(config.swap.sell_token);
    let buy_token = cmd.buy_token.unwrap_or(config.swap.buy_token);
    let amount_text = cmd
        .sell_amount
        .as_deref()
        .unwrap_or(&config.swap.sell_amount);
    let fee = cmd
        .fee
        .as_deref()
        .unwrap_or(&config.swap.buy_token_percentage_fee)
        .to_string();

    let decimals = chain.token_decimals(sell_token).await?;
    let sell_amount: U256 = parse_units(amount_text, decimals)
        .with_context(|| format!("卖出数量 {amount_text} 无法按 {decimals} 位精度解析"))?
        .get_absolute();

    // taker 同时充当联盟费与顺差的接收地址，与原始演示保持一致。
    let taker = chain.address();
    Ok(SwapRequest {
        chain_id: chain.chain_id(),
        sell_token,
        buy_token,
        sell_amount,
        taker,
        affiliate_address: taker,
        buy_token_percentage_fee: fee,
        fee_recipient: taker,
    })
}

fn init_tracing(config: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}
