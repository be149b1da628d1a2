use crate::error::ChannelTranslationError;
use df_types::CurrencyPair;

const DEPTH_CHANNEL_PREFIX: &str = "dish_length_5_";
const DEPTH_CHANNEL_SUFFIX: &str = "default";

// Checked in order, first match wins. None of these is a suffix of another.
const QUOTE_SUFFIXES: [&str; 5] = ["usdt", "pax", "btc", "eth", "qc"];

pub fn pair_to_channel(pair: &CurrencyPair) -> String {
    format!(
        "{DEPTH_CHANNEL_PREFIX}{}{DEPTH_CHANNEL_SUFFIX}",
        pair.to_symbol("").to_lowercase()
    )
}

/// Best-effort reverse of [`pair_to_channel`]. Only pairs quoted in one of the known
/// suffixes can be recovered.
pub fn channel_to_pair(channel: &str) -> Result<CurrencyPair, ChannelTranslationError> {
    let trimmed = channel
        .strip_suffix(DEPTH_CHANNEL_SUFFIX)
        .unwrap_or(channel);
    let symbol = trimmed.rsplit('_').next().unwrap_or(trimmed);

    QUOTE_SUFFIXES
        .iter()
        .find_map(|&quote| {
            symbol
                .strip_suffix(quote)
                .filter(|base| !base.is_empty())
                .map(|base| CurrencyPair::new(base, quote))
        })
        .ok_or_else(|| ChannelTranslationError {
            channel: channel.to_string(),
            partial: CurrencyPair::new(symbol, ""),
        })
}

/// Symbol used by the REST market data endpoints, e.g. `bcc_usdt`.
pub fn rest_symbol(pair: &CurrencyPair) -> String {
    pair.adapt_bch_to_bcc()
        .adapt_usd_to_usdt()
        .to_symbol("_")
        .to_lowercase()
}
