use serde::Deserialize;
use serde_json::Value;

/// `/swap/v1/sources` 响应：当前链上可用的流动性来源列表。
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesResponse {
    #[serde(default)]
    pub sources: Vec<LiquiditySource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquiditySource {
    pub name: String,
}

impl SourcesResponse {
    pub fn try_from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name.as_str()).collect()
    }
}
