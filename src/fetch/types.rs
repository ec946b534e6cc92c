use serde::Deserialize;

/// Candle payload from `/stock/candle` and `/forex/candle`: parallel arrays,
/// one entry per bar, plus a status string ("ok" or "no_data").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandleResponse {
    #[serde(default)]
    pub s: String,
    /// Close prices
    #[serde(default)]
    pub c: Vec<f64>,
    /// High prices
    #[serde(default)]
    pub h: Vec<f64>,
    /// Low prices
    #[serde(default)]
    pub l: Vec<f64>,
    /// Open prices
    #[serde(default)]
    pub o: Vec<f64>,
    /// Unix timestamps
    #[serde(default)]
    pub t: Vec<i64>,
    /// Volumes (absent on some FX responses)
    #[serde(default)]
    pub v: Vec<f64>,
}

/// Response from `/index/constituents`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexConstituents {
    #[serde(default)]
    pub constituents: Vec<String>,
}

/// Company profile from `/stock/profile2`. Finnhub answers an empty object
/// for tickers it has no profile for; the client maps that to `None` before
/// this struct is ever built.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockProfile {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub finnhub_industry: String,
    /// IPO date, `YYYY-MM-DD`
    #[serde(default)]
    pub ipo: String,
    #[serde(default)]
    pub logo: String,
    /// Market capitalization, in millions
    #[serde(default)]
    pub market_capitalization: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub share_outstanding: f64,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub weburl: String,
}

/// One symbol descriptor from `/forex/symbol`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxSymbol {
    #[serde(default)]
    pub description: String,
    /// Human-readable pair label, e.g. `EUR/USD`
    pub display_symbol: String,
    /// Vendor symbol used in candle requests, e.g. `OANDA:EUR_USD`
    pub symbol: String,
}
