//! Instrument classes and the per-class contract rules.
//!
//! The class decides two things the gateway cares about: which price field
//! may be requested, and how a symbol is turned into a contract description.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exchange used for spot forex pairs.
pub const FOREX_EXCHANGE: &str = "IDEALPRO";

/// Kind of instrument being downloaded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentClass {
    Forex,
    Cfd,
    Index,
    #[serde(rename = "cont_futures")]
    ContinuousFutures,
}

/// Which price series the source should aggregate into bars.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldSelector {
    Midpoint,
    Trades,
}

impl FieldSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldSelector::Midpoint => "MIDPOINT",
            FieldSelector::Trades => "TRADES",
        }
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InstrumentClass {
    pub const ALL: [InstrumentClass; 4] = [
        InstrumentClass::Forex,
        InstrumentClass::Cfd,
        InstrumentClass::Index,
        InstrumentClass::ContinuousFutures,
    ];

    /// Field selector used for this class.
    ///
    /// The source does not serve TRADES for forex or CFDs.
    pub fn field_selector(&self) -> FieldSelector {
        match self {
            InstrumentClass::Forex | InstrumentClass::Cfd => FieldSelector::Midpoint,
            InstrumentClass::Index | InstrumentClass::ContinuousFutures => FieldSelector::Trades,
        }
    }

    /// Whether the class can be requested with the given selector.
    pub fn supports(&self, selector: FieldSelector) -> bool {
        match self {
            InstrumentClass::Forex | InstrumentClass::Cfd => selector == FieldSelector::Midpoint,
            InstrumentClass::Index | InstrumentClass::ContinuousFutures => true,
        }
    }

    /// Security type code understood by the gateway.
    pub fn sec_type(&self) -> &'static str {
        match self {
            InstrumentClass::Forex => "CASH",
            InstrumentClass::Cfd => "CFD",
            InstrumentClass::Index => "IND",
            InstrumentClass::ContinuousFutures => "CONTFUT",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentClass::Forex => "forex",
            InstrumentClass::Cfd => "cfd",
            InstrumentClass::Index => "index",
            InstrumentClass::ContinuousFutures => "cont_futures",
        }
    }

    /// Build the contract description for one symbol of this class.
    pub fn contract(&self, info: &SymbolInfo) -> ContractSpec {
        match self {
            InstrumentClass::Forex => {
                // "EURUSD" trades as symbol EUR quoted in USD.
                let (base, quote) = split_pair(&info.symbol)
                    .unwrap_or((info.symbol.as_str(), info.currency.as_str()));
                ContractSpec {
                    symbol: base.to_string(),
                    sec_type: self.sec_type(),
                    exchange: FOREX_EXCHANGE.to_string(),
                    currency: quote.to_string(),
                    include_expired: false,
                }
            }
            InstrumentClass::Cfd | InstrumentClass::Index => ContractSpec {
                symbol: info.symbol.clone(),
                sec_type: self.sec_type(),
                exchange: info.exchange.clone(),
                currency: info.currency.clone(),
                include_expired: false,
            },
            InstrumentClass::ContinuousFutures => ContractSpec {
                symbol: info.symbol.clone(),
                sec_type: self.sec_type(),
                exchange: info.exchange.clone(),
                currency: info.currency.clone(),
                include_expired: true,
            },
        }
    }
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown instrument class '{0}' (expected forex, cfd, index or cont_futures)")]
pub struct UnknownClass(pub String);

impl FromStr for InstrumentClass {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forex" => Ok(InstrumentClass::Forex),
            "cfd" => Ok(InstrumentClass::Cfd),
            "index" => Ok(InstrumentClass::Index),
            "cont_futures" => Ok(InstrumentClass::ContinuousFutures),
            _ => Err(UnknownClass(s.to_string())),
        }
    }
}

/// A downloadable symbol with its display name and listing venue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolInfo {
    pub symbol: String,
    pub full_name: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Gateway contract id; skips contract lookup when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conid: Option<i64>,
}

fn default_exchange() -> String {
    "SMART".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

impl SymbolInfo {
    pub fn new(symbol: &str, full_name: &str, exchange: &str, currency: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            full_name: full_name.to_string(),
            exchange: exchange.to_string(),
            currency: currency.to_string(),
            conid: None,
        }
    }

    /// Forex pairs use the pair itself as display name.
    pub fn forex(pair: &str) -> Self {
        let currency = split_pair(pair).map(|(_, quote)| quote).unwrap_or("USD");
        Self::new(pair, pair, FOREX_EXCHANGE, currency)
    }
}

/// Contract description handed to the data source.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractSpec {
    pub symbol: String,
    pub sec_type: &'static str,
    pub exchange: String,
    pub currency: String,
    pub include_expired: bool,
}

fn split_pair(pair: &str) -> Option<(&str, &str)> {
    if pair.len() == 6 && pair.is_ascii() {
        Some(pair.split_at(3))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_follows_class() {
        assert_eq!(InstrumentClass::Forex.field_selector(), FieldSelector::Midpoint);
        assert_eq!(InstrumentClass::Cfd.field_selector(), FieldSelector::Midpoint);
        assert_eq!(InstrumentClass::Index.field_selector(), FieldSelector::Trades);
        assert_eq!(
            InstrumentClass::ContinuousFutures.field_selector(),
            FieldSelector::Trades
        );
    }

    #[test]
    fn trades_unsupported_for_forex_and_cfd() {
        assert!(!InstrumentClass::Forex.supports(FieldSelector::Trades));
        assert!(!InstrumentClass::Cfd.supports(FieldSelector::Trades));
        assert!(InstrumentClass::Index.supports(FieldSelector::Midpoint));
    }

    #[test]
    fn parse_class_names() {
        assert_eq!("forex".parse::<InstrumentClass>(), Ok(InstrumentClass::Forex));
        assert_eq!("CFD".parse::<InstrumentClass>(), Ok(InstrumentClass::Cfd));
        assert_eq!(
            "cont_futures".parse::<InstrumentClass>(),
            Ok(InstrumentClass::ContinuousFutures)
        );
        assert!("stock".parse::<InstrumentClass>().is_err());
    }

    #[test]
    fn forex_contract_splits_pair() {
        let info = SymbolInfo::forex("EURUSD");
        let contract = InstrumentClass::Forex.contract(&info);
        assert_eq!(contract.symbol, "EUR");
        assert_eq!(contract.currency, "USD");
        assert_eq!(contract.exchange, FOREX_EXCHANGE);
        assert_eq!(contract.sec_type, "CASH");
    }

    #[test]
    fn continuous_futures_include_expired() {
        let info = SymbolInfo::new("ES", "S&P_500_Mini_FUT", "GLOBEX", "USD");
        let contract = InstrumentClass::ContinuousFutures.contract(&info);
        assert!(contract.include_expired);
        assert_eq!(contract.exchange, "GLOBEX");
    }
}
