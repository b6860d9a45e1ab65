//! Static symbol-to-id tables for sources that key assets by their own ids.
//!
//! Symbols missing from a table fall back to the lower-cased symbol.

const COINGECKO_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("ADA", "cardano"),
    ("DOT", "polkadot"),
    ("LINK", "chainlink"),
    ("XRP", "ripple"),
    ("DOGE", "dogecoin"),
    ("AVAX", "avalanche-2"),
    ("MATIC", "matic-network"),
    ("LTC", "litecoin"),
    ("BNB", "binancecoin"),
    ("ATOM", "cosmos"),
    ("UNI", "uniswap"),
    ("TRX", "tron"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
];

const COINPAPRIKA_IDS: &[(&str, &str)] = &[
    ("BTC", "btc-bitcoin"),
    ("ETH", "eth-ethereum"),
    ("SOL", "sol-solana"),
    ("ADA", "ada-cardano"),
    ("DOT", "dot-polkadot"),
    ("LINK", "link-chainlink"),
    ("XRP", "xrp-xrp"),
    ("DOGE", "doge-dogecoin"),
    ("AVAX", "avax-avalanche"),
    ("MATIC", "matic-polygon"),
    ("LTC", "ltc-litecoin"),
    ("BNB", "bnb-binance-coin"),
    ("ATOM", "atom-cosmos"),
    ("UNI", "uni-uniswap"),
    ("TRX", "trx-tron"),
    ("USDT", "usdt-tether"),
    ("USDC", "usdc-usd-coin"),
];

const KRAKEN_BASES: &[(&str, &str)] = &[("BTC", "XBT"), ("DOGE", "XDG")];

fn lookup(table: &[(&str, &'static str)], symbol: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(sym, _)| sym.eq_ignore_ascii_case(symbol))
        .map(|(_, id)| *id)
}

pub fn coingecko_id(symbol: &str) -> String {
    lookup(COINGECKO_IDS, symbol)
        .map(str::to_string)
        .unwrap_or_else(|| symbol.to_lowercase())
}

pub fn coinpaprika_id(symbol: &str) -> String {
    lookup(COINPAPRIKA_IDS, symbol)
        .map(str::to_string)
        .unwrap_or_else(|| symbol.to_lowercase())
}

/// Kraken's legacy asset code (`XBT` for BTC), otherwise the symbol itself.
pub fn kraken_base(symbol: &str) -> String {
    lookup(KRAKEN_BASES, symbol)
        .map(str::to_string)
        .unwrap_or_else(|| symbol.to_uppercase())
}

/// Exchanges without USD books quote against USDT instead.
pub fn exchange_quote(quote: &str) -> String {
    if quote.eq_ignore_ascii_case("USD") {
        "USDT".to_string()
    } else {
        quote.to_uppercase()
    }
}
