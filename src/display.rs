//! 面向终端的报价信息展示。

use rust_decimal::Decimal;

use crate::api::sources::SourcesResponse;
use crate::api::swap::{SwapRoute, TokenMetadata};
use crate::api::QuoteResponse;

/// 基点转百分比，保留两位小数：6000 -> "60.00%"。
pub fn format_bps(bps: u32) -> String {
    let percent = Decimal::from(bps) / Decimal::from(100);
    format!("{percent:.2}%")
}

/// 百分比小数转展示值："0.01" -> "1.00%"。非法输入原样忽略。
pub fn format_fee_fraction(fraction: &str) -> Option<String> {
    let fraction: Decimal = fraction.trim().parse().ok()?;
    let percent = fraction * Decimal::from(100);
    Some(format!("{percent:.2}%"))
}

pub fn report_sources(chain_id: u64, sources: &SourcesResponse) {
    println!("chainId {chain_id} 上可用的流动性来源：");
    println!("    {}", sources.names().join(",\n    "));
}

fn report_route(route: &SwapRoute) {
    println!("{} Sources", route.fills.len());
    for fill in &route.fills {
        println!("{}: {}", fill.source, format_bps(fill.proportion_bps));
    }
}

fn report_token_taxes(metadata: &TokenMetadata) {
    if metadata.buy_token.buy_tax_bps > 0 || metadata.buy_token.sell_tax_bps > 0 {
        println!("Buy Token Buy Tax: {}", format_bps(metadata.buy_token.buy_tax_bps));
        println!("Buy Token Sell Tax: {}", format_bps(metadata.buy_token.sell_tax_bps));
    }
    if metadata.sell_token.buy_tax_bps > 0 || metadata.sell_token.sell_tax_bps > 0 {
        println!("Sell Token Buy Tax: {}", format_bps(metadata.sell_token.buy_tax_bps));
        println!("Sell Token Sell Tax: {}", format_bps(metadata.sell_token.sell_tax_bps));
    }
}

/// quote 阶段的信息汇报：路由占比、代币税、联盟费率与顺差回收说明。
pub fn report_quote(quote: &QuoteResponse) {
    if let Some(route) = &quote.route {
        report_route(route);
    }
    if let Some(metadata) = &quote.token_metadata {
        report_token_taxes(metadata);
    }
    if let Some(fee) = &quote.buy_token_percentage_fee {
        if let Some(rendered) = format_fee_fraction(fee) {
            println!("Affiliate Fee: {rendered}");
        }
    }
    // 顺差回收没有显式回传字段，feeRecipient 参数一旦携带即视为开启。
    println!("Surplus collection is enabled.");
}
