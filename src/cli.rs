use clap::Parser;

/// Pull a market index's company profiles and daily prices, plus FX symbol
/// listings and daily rates, from Finnhub into a local SQLite database.
#[derive(Debug, Parser)]
#[command(name = "finnhub-sync", version, about)]
pub struct Cli {
    /// Market index code, without the leading caret
    #[arg(short, long, default_value = "NDX")]
    pub market: String,

    /// First day of the price range
    #[arg(long = "from", value_name = "DD/MM/YYYY", default_value = "10/01/2020")]
    pub from_date: String,

    /// Last day of the price range
    #[arg(long = "to", value_name = "DD/MM/YYYY", default_value = "10/01/2021")]
    pub to_date: String,

    /// Currency pairs to pull daily rates for
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "AUD/USD,EUR/USD,GBP/USD"
    )]
    pub pairs: Vec<String>,

    /// Path of the SQLite database file
    #[arg(long, default_value = "dati/finnhub.db")]
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_a_full_run() {
        let cli = Cli::parse_from(["finnhub-sync"]);
        assert_eq!(cli.market, "NDX");
        assert_eq!(cli.from_date, "10/01/2020");
        assert_eq!(cli.to_date, "10/01/2021");
        assert_eq!(cli.pairs, vec!["AUD/USD", "EUR/USD", "GBP/USD"]);
        assert_eq!(cli.database, "dati/finnhub.db");
    }

    #[test]
    fn pairs_split_on_commas() {
        let cli = Cli::parse_from(["finnhub-sync", "--pairs", "EUR/USD,USD/JPY"]);
        assert_eq!(cli.pairs, vec!["EUR/USD", "USD/JPY"]);
    }
}
