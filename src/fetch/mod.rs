use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::error::{AppError, Context, Result};

pub mod params;
pub mod types;

pub use params::{encode_params, Param};
pub use types::{CandleResponse, FxSymbol, IndexConstituents, StockProfile};

const BASE_URL: &str = "https://finnhub.io/api/v1";

/// Per-request ceiling applied unless overridden at construction.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Body of a successful API call, keyed on the response content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiPayload {
    Json(Value),
    Text(String),
}

/// The Finnhub operations the sync job consumes. Implemented by
/// [`FinnhubClient`] and by scripted doubles in tests.
pub trait MarketDataApi {
    fn index_constituents(&self, symbol: &str, extra: &[(&str, Param)])
        -> Result<IndexConstituents>;

    /// `Ok(None)` when Finnhub has no profile for the symbol.
    fn stock_profile(&self, symbol: &str, extra: &[(&str, Param)])
        -> Result<Option<StockProfile>>;

    fn stock_candles(
        &self,
        symbol: &str,
        resolution: &str,
        from: i64,
        to: i64,
        extra: &[(&str, Param)],
    ) -> Result<CandleResponse>;

    fn forex_exchanges(&self, extra: &[(&str, Param)]) -> Result<Vec<String>>;

    fn fx_symbols(&self, exchange: &str, extra: &[(&str, Param)]) -> Result<Vec<FxSymbol>>;

    fn fx_candles(
        &self,
        symbol: &str,
        resolution: &str,
        from: i64,
        to: i64,
        extra: &[(&str, Param)],
    ) -> Result<CandleResponse>;
}

/// One authenticated Finnhub session. The token rides along as a `token`
/// query parameter on every request.
pub struct FinnhubClient {
    client: Client,
    token: String,
}

impl FinnhubClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to construct Finnhub HTTP client")?;

        Ok(Self {
            client,
            token: token.into(),
        })
    }

    fn get(&self, path: &str, params: &[(&str, Param)]) -> Result<ApiPayload> {
        let url = format!("{}{}", BASE_URL, path);
        let mut query = encode_params(params);
        query.push(("token".to_string(), self.token.clone()));

        debug!("GET {} with {} params", path, params.len());

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .with_context(|| format!("Request to {} failed", path))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .with_context(|| format!("Failed to read response body from {}", path))?;

        interpret_response(status, &content_type, &body)
    }

    fn get_json(&self, path: &str, params: &[(&str, Param)]) -> Result<Value> {
        match self.get(path, params)? {
            ApiPayload::Json(value) => Ok(value),
            ApiPayload::Text(text) => Err(AppError::InvalidResponse(text)),
        }
    }

    fn merged<'a>(
        required: Vec<(&'a str, Param)>,
        extra: &[(&'a str, Param)],
    ) -> Vec<(&'a str, Param)> {
        let mut params = required;
        params.extend(extra.iter().cloned());
        params
    }
}

impl MarketDataApi for FinnhubClient {
    fn index_constituents(
        &self,
        symbol: &str,
        extra: &[(&str, Param)],
    ) -> Result<IndexConstituents> {
        let params = Self::merged(vec![("symbol", Param::from(symbol))], extra);
        let value = self.get_json("/index/constituents", &params)?;
        Ok(serde_json::from_value(value)?)
    }

    fn stock_profile(
        &self,
        symbol: &str,
        extra: &[(&str, Param)],
    ) -> Result<Option<StockProfile>> {
        let params = Self::merged(vec![("symbol", Param::from(symbol))], extra);
        let value = self.get_json("/stock/profile2", &params)?;

        // Finnhub answers {} instead of an error for unknown tickers.
        if value.as_object().is_some_and(|fields| fields.is_empty()) {
            return Ok(None);
        }

        Ok(Some(serde_json::from_value(value)?))
    }

    fn stock_candles(
        &self,
        symbol: &str,
        resolution: &str,
        from: i64,
        to: i64,
        extra: &[(&str, Param)],
    ) -> Result<CandleResponse> {
        let params = Self::merged(
            vec![
                ("symbol", Param::from(symbol)),
                ("resolution", Param::from(resolution)),
                ("from", Param::from(from)),
                ("to", Param::from(to)),
            ],
            extra,
        );
        let value = self.get_json("/stock/candle", &params)?;
        Ok(serde_json::from_value(value)?)
    }

    fn forex_exchanges(&self, extra: &[(&str, Param)]) -> Result<Vec<String>> {
        let params = Self::merged(Vec::new(), extra);
        let value = self.get_json("/forex/exchange", &params)?;
        Ok(serde_json::from_value(value)?)
    }

    fn fx_symbols(&self, exchange: &str, extra: &[(&str, Param)]) -> Result<Vec<FxSymbol>> {
        let params = Self::merged(vec![("exchange", Param::from(exchange))], extra);
        let value = self.get_json("/forex/symbol", &params)?;
        Ok(serde_json::from_value(value)?)
    }

    fn fx_candles(
        &self,
        symbol: &str,
        resolution: &str,
        from: i64,
        to: i64,
        extra: &[(&str, Param)],
    ) -> Result<CandleResponse> {
        let params = Self::merged(
            vec![
                ("symbol", Param::from(symbol)),
                ("resolution", Param::from(resolution)),
                ("from", Param::from(from)),
                ("to", Param::from(to)),
            ],
            extra,
        );
        let value = self.get_json("/forex/candle", &params)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Classify a raw HTTP outcome. Non-success statuses always become
/// [`AppError::Api`], whatever the body holds; successful responses dispatch
/// on content type.
pub fn interpret_response(status: u16, content_type: &str, body: &str) -> Result<ApiPayload> {
    if !(200..300).contains(&status) {
        return Err(AppError::Api {
            status,
            message: vendor_error_message(body),
        });
    }

    if content_type.contains("application/json") {
        return match serde_json::from_str(body) {
            Ok(value) => Ok(ApiPayload::Json(value)),
            Err(_) => Err(AppError::InvalidResponse(body.to_string())),
        };
    }

    if content_type.contains("text/csv") || content_type.contains("text/plain") {
        return Ok(ApiPayload::Text(body.to_string()));
    }

    Err(AppError::InvalidResponse(body.to_string()))
}

fn vendor_error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| String::from("error payload without an error field")),
        Err(_) => format!("non-JSON error body: {}", body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_status_is_api_error_with_vendor_message() {
        let err = interpret_response(429, "application/json", r#"{"error":"API limit reached"}"#)
            .unwrap_err();

        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "API limit reached");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn non_success_status_with_unparseable_body_is_still_api_error() {
        let err = interpret_response(502, "text/html", "<html>bad gateway</html>").unwrap_err();

        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 502);
                assert!(message.contains("bad gateway"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn non_success_json_without_error_field_uses_fallback_message() {
        let err = interpret_response(400, "application/json", r#"{"detail":"nope"}"#).unwrap_err();

        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("without an error field"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn success_json_round_trips_to_parsed_value() {
        let payload =
            interpret_response(200, "application/json; charset=utf-8", r#"{"c":[1.0]}"#).unwrap();

        assert_eq!(
            payload,
            ApiPayload::Json(serde_json::json!({ "c": [1.0] }))
        );
    }

    #[test]
    fn success_csv_and_plain_text_return_body_unchanged() {
        let csv = "t,o,h,l,c\n1,2,3,1,2\n";
        assert_eq!(
            interpret_response(200, "text/csv", csv).unwrap(),
            ApiPayload::Text(csv.to_string())
        );

        assert_eq!(
            interpret_response(200, "text/plain; charset=utf-8", "ok").unwrap(),
            ApiPayload::Text("ok".to_string())
        );
    }

    #[test]
    fn success_with_unrecognized_content_type_is_invalid_response() {
        let err = interpret_response(200, "application/octet-stream", "raw bytes").unwrap_err();

        match err {
            AppError::InvalidResponse(text) => assert_eq!(text, "raw bytes"),
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }

    #[test]
    fn success_with_malformed_json_body_is_invalid_response() {
        let err = interpret_response(200, "application/json", "{not json").unwrap_err();

        match err {
            AppError::InvalidResponse(text) => assert_eq!(text, "{not json"),
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }
}
