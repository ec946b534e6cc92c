use std::thread;
use std::time::{Duration, Instant};

use chrono::{Local, LocalResult, NaiveDate, TimeZone};
use log::{debug, info, warn};

use crate::database::{Database, FxPriceRow, FxSymbolRow, StockPriceRow, StockProfileRow};
use crate::error::{AppError, Result};
use crate::fetch::{CandleResponse, MarketDataApi, StockProfile};

/// Pause before the single retry in the stock phases. Finnhub's free tier
/// meters calls per minute, so one long sleep usually clears the limit.
pub const RETRY_DELAY: Duration = Duration::from_secs(80);

const DAILY_RESOLUTION: &str = "D";

/// Vendor symbols outside the forex market category (crypto listings and the
/// like) are skipped when resolving requested pairs.
const FOREX_MARKER: &str = "FOREX";

/// Parameters of one sync run.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Market index code without the caret, e.g. `NDX`
    pub market: String,
    /// Range start, `DD/MM/YYYY`
    pub from_date: String,
    /// Range end, `DD/MM/YYYY`
    pub to_date: String,
    /// Currency pair labels, e.g. `EUR/USD`
    pub fx_pairs: Vec<String>,
}

/// Row counts per table plus the total wall-clock duration.
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub stock_profiles: usize,
    pub stock_prices: usize,
    pub fx_symbols: usize,
    pub fx_prices: usize,
    pub elapsed: Duration,
}

/// The four-phase fetch-and-store sequence: stock anagraphics, stock price
/// history, FX anagraphics, FX price history, in that order, each persisted
/// as one batch.
pub struct SyncJob<'a, A: MarketDataApi> {
    api: &'a A,
    retry_delay: Duration,
}

impl<'a, A: MarketDataApi> SyncJob<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self::with_retry_delay(api, RETRY_DELAY)
    }

    pub fn with_retry_delay(api: &'a A, retry_delay: Duration) -> Self {
        Self { api, retry_delay }
    }

    pub fn run(&self, db: &mut Database, request: &SyncRequest) -> Result<SyncSummary> {
        let started = Instant::now();

        let from_ts = local_midnight_timestamp(&request.from_date)?;
        let to_ts = local_midnight_timestamp(&request.to_date)?;

        let index = format!("^{}", request.market);
        let constituents = self.api.index_constituents(&index, &[])?.constituents;
        info!("{} lists {} constituents", index, constituents.len());

        // Phase 1: stock anagraphics
        let mut profiles = Vec::new();
        for ticker in &constituents {
            match self.with_retry(|| self.api.stock_profile(ticker, &[]))? {
                Some(profile) => profiles.push(profile_row(profile)),
                None => debug!("No profile for {}, skipping", ticker),
            }
        }
        let stock_profiles = db.insert_stock_profiles(&profiles)?;

        // Phase 2: stock price history
        let mut prices = Vec::new();
        for ticker in &constituents {
            let candles = self.with_retry(|| {
                self.api
                    .stock_candles(ticker, DAILY_RESOLUTION, from_ts, to_ts, &[])
            })?;
            expand_stock_candles(ticker, &candles, &mut prices)?;
        }
        let stock_prices = db.insert_stock_prices(&prices)?;

        // Phase 3: FX anagraphics (no retry policy here)
        let mut symbols = Vec::new();
        for exchange in self.api.forex_exchanges(&[])? {
            for symbol in self.api.fx_symbols(&exchange, &[])? {
                symbols.push(FxSymbolRow {
                    description: symbol.description,
                    display_symbol: symbol.display_symbol,
                    symbol: symbol.symbol,
                });
            }
        }
        let fx_symbols = db.insert_fx_symbols(&symbols)?;

        // Phase 4: FX price history. A requested pair with no matching
        // forex-market symbol produces zero rows.
        let mut fx_rows = Vec::new();
        for pair in &request.fx_pairs {
            for symbol in symbols
                .iter()
                .filter(|s| s.display_symbol == *pair && s.symbol.contains(FOREX_MARKER))
            {
                let candles =
                    self.api
                        .fx_candles(&symbol.symbol, DAILY_RESOLUTION, from_ts, to_ts, &[])?;
                expand_fx_candles(pair, &candles, &mut fx_rows)?;
            }
        }
        let fx_prices = db.insert_fx_prices(&fx_rows)?;

        let elapsed = started.elapsed();
        info!(
            "Stored {} profiles, {} stock bars, {} FX symbols, {} FX bars in {:.2}s",
            stock_profiles,
            stock_prices,
            fx_symbols,
            fx_prices,
            elapsed.as_secs_f64()
        );

        Ok(SyncSummary {
            stock_profiles,
            stock_prices,
            fx_symbols,
            fx_prices,
            elapsed,
        })
    }

    /// One blind retry after a fixed sleep; a second failure propagates.
    fn with_retry<T>(&self, call: impl Fn() -> Result<T>) -> Result<T> {
        match call() {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(
                    "Request failed ({}), retrying once in {:.0}s",
                    err,
                    self.retry_delay.as_secs_f64()
                );
                thread::sleep(self.retry_delay);
                call()
            }
        }
    }
}

fn profile_row(profile: StockProfile) -> StockProfileRow {
    StockProfileRow {
        country: profile.country,
        currency: profile.currency,
        exchange: profile.exchange,
        industry: profile.finnhub_industry,
        ipo: profile.ipo,
        logo: profile.logo,
        market_capitalization: profile.market_capitalization,
        name: profile.name,
        phone: profile.phone,
        share_outstanding: profile.share_outstanding,
        ticker: profile.ticker,
        weburl: profile.weburl,
    }
}

fn expand_stock_candles(
    ticker: &str,
    candles: &CandleResponse,
    out: &mut Vec<StockPriceRow>,
) -> Result<()> {
    check_series_lengths(candles, true)?;

    for i in 0..candles.c.len() {
        out.push(StockPriceRow {
            ticker: ticker.to_string(),
            close: candles.c[i],
            high: candles.h[i],
            low: candles.l[i],
            open: candles.o[i],
            date: bar_date(candles.t[i])?,
            volume: candles.v[i],
        });
    }

    Ok(())
}

fn expand_fx_candles(pair: &str, candles: &CandleResponse, out: &mut Vec<FxPriceRow>) -> Result<()> {
    check_series_lengths(candles, false)?;

    for i in 0..candles.c.len() {
        out.push(FxPriceRow {
            pair: pair.to_string(),
            close: candles.c[i],
            high: candles.h[i],
            low: candles.l[i],
            open: candles.o[i],
            date: bar_date(candles.t[i])?,
        });
    }

    Ok(())
}

fn check_series_lengths(candles: &CandleResponse, require_volume: bool) -> Result<()> {
    let len = candles.c.len();
    let ragged = candles.h.len() != len
        || candles.l.len() != len
        || candles.o.len() != len
        || candles.t.len() != len
        || (require_volume && candles.v.len() != len);

    if ragged {
        return Err(AppError::InvalidResponse(format!(
            "mismatched candle array lengths (c={}, h={}, l={}, o={}, t={}, v={})",
            len,
            candles.h.len(),
            candles.l.len(),
            candles.o.len(),
            candles.t.len(),
            candles.v.len(),
        )));
    }

    Ok(())
}

/// `DD/MM/YYYY` to a Unix timestamp at local midnight.
fn local_midnight_timestamp(date: &str) -> Result<i64> {
    let parsed = NaiveDate::parse_from_str(date, "%d/%m/%Y")?;
    let naive = parsed
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::message(format!("Unable to build midnight for {}", date)))?;

    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.timestamp()),
        LocalResult::Ambiguous(first, _) => Ok(first.timestamp()),
        LocalResult::None => Err(AppError::message(format!(
            "No local midnight exists for {}",
            date
        ))),
    }
}

/// Bar timestamp to a local `YYYY-MM-DD` date string.
fn bar_date(ts: i64) -> Result<String> {
    match Local.timestamp_opt(ts, 0) {
        LocalResult::Single(dt) => Ok(dt.format("%Y-%m-%d").to_string()),
        LocalResult::Ambiguous(first, _) => Ok(first.format("%Y-%m-%d").to_string()),
        LocalResult::None => Err(AppError::message(format!("Invalid bar timestamp {}", ts))),
    }
}
