use std::path::Path;

use log::debug;
use rusqlite::{params, Connection};

use crate::error::Result;

/// One row of the `stock_profiles` table.
#[derive(Debug, Clone)]
pub struct StockProfileRow {
    pub country: String,
    pub currency: String,
    pub exchange: String,
    pub industry: String,
    pub ipo: String,
    pub logo: String,
    pub market_capitalization: f64,
    pub name: String,
    pub phone: String,
    pub share_outstanding: f64,
    pub ticker: String,
    pub weburl: String,
}

/// One daily price bar of the `stock_prices` table.
#[derive(Debug, Clone)]
pub struct StockPriceRow {
    pub ticker: String,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    /// Bar date, `YYYY-MM-DD`
    pub date: String,
    pub volume: f64,
}

/// One row of the `fx_symbols` table.
#[derive(Debug, Clone)]
pub struct FxSymbolRow {
    pub description: String,
    pub display_symbol: String,
    pub symbol: String,
}

/// One daily price bar of the `fx_prices` table, tagged with the pair label
/// the caller asked for rather than the vendor symbol.
#[derive(Debug, Clone)]
pub struct FxPriceRow {
    pub pair: String,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub date: String,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stock_profiles (
    id INTEGER PRIMARY KEY,
    country TEXT,
    currency TEXT,
    exchange TEXT,
    industry TEXT,
    ipo TEXT,
    logo TEXT,
    market_capitalization REAL,
    name TEXT,
    phone TEXT,
    share_outstanding REAL,
    ticker TEXT,
    weburl TEXT
);

CREATE TABLE IF NOT EXISTS stock_prices (
    id INTEGER PRIMARY KEY,
    ticker TEXT,
    close REAL,
    high REAL,
    low REAL,
    open REAL,
    date TEXT,
    volume REAL
);

CREATE TABLE IF NOT EXISTS fx_symbols (
    id INTEGER PRIMARY KEY,
    description TEXT,
    display_symbol TEXT,
    symbol TEXT
);

CREATE TABLE IF NOT EXISTS fx_prices (
    id INTEGER PRIMARY KEY,
    pair TEXT,
    close REAL,
    high REAL,
    low REAL,
    open REAL,
    date TEXT
);
"#;

const TABLES: [&str; 4] = ["stock_profiles", "stock_prices", "fx_symbols", "fx_prices"];

/// SQLite store for one run's worth of reference and price data.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database file, creating parent directories first.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create any missing tables, then purge all rows from all four. Every
    /// run starts from empty tables, whether or not they already existed.
    pub fn reset(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        for table in TABLES {
            self.conn
                .execute(&format!("DELETE FROM {}", table), [])?;
        }
        debug!("Database schema ready, previous rows purged");
        Ok(())
    }

    pub fn insert_stock_profiles(&mut self, rows: &[StockProfileRow]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO stock_profiles
                (country, currency, exchange, industry, ipo, logo,
                 market_capitalization, name, phone, share_outstanding, ticker, weburl)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )?;

            for row in rows {
                stmt.execute(params![
                    row.country,
                    row.currency,
                    row.exchange,
                    row.industry,
                    row.ipo,
                    row.logo,
                    row.market_capitalization,
                    row.name,
                    row.phone,
                    row.share_outstanding,
                    row.ticker,
                    row.weburl,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn insert_stock_prices(&mut self, rows: &[StockPriceRow]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO stock_prices (ticker, close, high, low, open, date, volume)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;

            for row in rows {
                stmt.execute(params![
                    row.ticker, row.close, row.high, row.low, row.open, row.date, row.volume,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn insert_fx_symbols(&mut self, rows: &[FxSymbolRow]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO fx_symbols (description, display_symbol, symbol)
                VALUES (?1, ?2, ?3)
                "#,
            )?;

            for row in rows {
                stmt.execute(params![row.description, row.display_symbol, row.symbol])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn insert_fx_prices(&mut self, rows: &[FxPriceRow]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO fx_prices (pair, close, high, low, open, date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;

            for row in rows {
                stmt.execute(params![
                    row.pair, row.close, row.high, row.low, row.open, row.date,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    #[cfg(test)]
    pub(crate) fn count_rows(&self, table: &str) -> Result<i64> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_price(ticker: &str, date: &str) -> StockPriceRow {
        StockPriceRow {
            ticker: ticker.to_string(),
            close: 101.0,
            high: 102.0,
            low: 99.0,
            open: 100.0,
            date: date.to_string(),
            volume: 1_000_000.0,
        }
    }

    #[test]
    fn reset_creates_all_four_tables_empty() {
        let db = Database::open_in_memory().unwrap();
        db.reset().unwrap();

        for table in TABLES {
            assert_eq!(db.count_rows(table).unwrap(), 0, "{} not empty", table);
        }
    }

    #[test]
    fn reset_purges_rows_from_a_previous_run() {
        let mut db = Database::open_in_memory().unwrap();
        db.reset().unwrap();

        db.insert_stock_prices(&[sample_price("AAPL", "2020-01-10")])
            .unwrap();
        db.insert_fx_symbols(&[FxSymbolRow {
            description: "Euro/US Dollar".to_string(),
            display_symbol: "EUR/USD".to_string(),
            symbol: "OANDA:EUR_USD".to_string(),
        }])
        .unwrap();
        assert_eq!(db.count_rows("stock_prices").unwrap(), 1);
        assert_eq!(db.count_rows("fx_symbols").unwrap(), 1);

        db.reset().unwrap();

        for table in TABLES {
            assert_eq!(db.count_rows(table).unwrap(), 0, "{} not purged", table);
        }
    }

    #[test]
    fn bulk_insert_reports_batch_size() {
        let mut db = Database::open_in_memory().unwrap();
        db.reset().unwrap();

        let rows = vec![
            sample_price("AAPL", "2020-01-10"),
            sample_price("AAPL", "2020-01-11"),
            sample_price("MSFT", "2020-01-10"),
        ];
        let inserted = db.insert_stock_prices(&rows).unwrap();

        assert_eq!(inserted, 3);
        assert_eq!(db.count_rows("stock_prices").unwrap(), 3);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut db = Database::open_in_memory().unwrap();
        db.reset().unwrap();

        assert_eq!(db.insert_fx_prices(&[]).unwrap(), 0);
        assert_eq!(db.count_rows("fx_prices").unwrap(), 0);
    }
}
