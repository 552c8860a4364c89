//! Instrument catalog — the symbols to download, grouped by instrument class.
//!
//! Stored as a TOML file. Forex pairs are plain strings; the other classes
//! carry a display name, exchange and currency per symbol.

use crate::instrument::{InstrumentClass, SymbolInfo};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("read catalog file: {0}")]
    Read(#[from] std::io::Error),

    #[error("parse catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize catalog: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("symbol '{symbol}' is not in the {class} catalog")]
    UnknownSymbol {
        class: InstrumentClass,
        symbol: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Catalog {
    pub forex: Vec<String>,
    pub cfd: Vec<SymbolInfo>,
    pub index: Vec<SymbolInfo>,
    pub cont_futures: Vec<SymbolInfo>,
}

impl Catalog {
    /// Load a catalog from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a catalog from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize the catalog to TOML.
    pub fn to_toml(&self) -> Result<String, CatalogError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// All symbols of one class.
    pub fn entries(&self, class: InstrumentClass) -> Vec<SymbolInfo> {
        match class {
            InstrumentClass::Forex => self.forex.iter().map(|p| SymbolInfo::forex(p)).collect(),
            InstrumentClass::Cfd => self.cfd.clone(),
            InstrumentClass::Index => self.index.clone(),
            InstrumentClass::ContinuousFutures => self.cont_futures.clone(),
        }
    }

    /// Entries for the requested symbols, in request order. Empty means all.
    pub fn select(
        &self,
        class: InstrumentClass,
        symbols: &[String],
    ) -> Result<Vec<SymbolInfo>, CatalogError> {
        let entries = self.entries(class);
        if symbols.is_empty() {
            return Ok(entries);
        }
        symbols
            .iter()
            .map(|wanted| {
                entries
                    .iter()
                    .find(|e| e.symbol.eq_ignore_ascii_case(wanted))
                    .cloned()
                    .ok_or_else(|| CatalogError::UnknownSymbol {
                        class,
                        symbol: wanted.clone(),
                    })
            })
            .collect()
    }

    /// Built-in instrument lists.
    pub fn default_catalog() -> Self {
        let forex = [
            "EURUSD", "USDSGD", "USDJPY", "USDHKD", "USDCNH", "USDCAD", "USDCHF", "EURSGD",
            "GBPUSD", "EURGBP", "EURAUD", "GBPAUD", "AUDUSD", "AUDSGD", "AUDHKD", "AUDCNH",
            "AUDJPY", "NZDUSD", "SGDJPY", "SGDCNH", "CHFJPY", "EURCHF", "USDKRW", "CADJPY",
            "EURCAD", "AUDCAD", "GBPNZD", "GBPSGD", "USDCZK", "USDDKK", "USDHUF", "USDILS",
            "USDMXN", "USDNOK", "USDPLN", "USDRUB", "USDSEK", "USDTRY", "USDZAR",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let cfd = smart_list(&[
            ("IBUS500", "S&P500_CFD", "USD"),
            ("IBUST100", "Nasdaq100_CFD", "USD"),
            ("IBUS30", "DowJonesIndustrialAverage_CFD", "USD"),
            ("IBDE30", "Dax30_CFD", "EUR"),
            ("IBFR40", "CAC30_CFD", "EUR"),
            ("IBGB100", "FTSE100_CFD", "GBP"),
            ("IBES35", "IBEX35_CFD", "EUR"),
            ("IBCH20", "SMI20_CFD", "CHF"),
            ("IBNL25", "AEX25_CFD", "EUR"),
            ("IBEU50", "Euronext50_CFD", "EUR"),
            ("IBAU200", "ASX200_CFD", "AUD"),
            ("IBHK50", "HangSeng50_CFD", "HKD"),
            ("IBJP225", "Nikkei225_CFD", "JPY"),
        ]);

        let index = vec![
            SymbolInfo::new("SPX", "S&P500_Ind", "CBOE", "USD"),
            SymbolInfo::new("INDU", "DowJonesIndustrialAverage_Ind", "CME", "USD"),
        ];

        let cont_futures = usd_list(&[
            ("HG", "Copper_FUT", "NYMEX"),
            ("ZO", "Oat_FUT", "ECBOT"),
            ("ZF", "5_year_treasury_note_FUT", "ECBOT"),
            ("ZN", "10_year_treasury_note_FUT", "ECBOT"),
            ("ZB", "30_year_treasury_bond_FUT", "ECBOT"),
            ("YM", "Dow_Jones_Industrial_Average_FUT", "ECBOT"),
            ("EMD", "S&P_MidCap_400_Mini_FUT", "GLOBEX"),
            ("ES", "S&P_500_Mini_FUT", "GLOBEX"),
            ("NQ", "Nasdaq_100_mini_FUT", "GLOBEX"),
            ("NKD", "Nikkei225_FUT", "GLOBEX"),
            ("PL", "Platinum_FUT", "NYMEX"),
            ("BZ", "Brent_Crude_Oil_FUT", "NYMEX"),
            ("CL", "Light_sweet_crude_oil_FUT", "NYMEX"),
            ("GC", "Gold_FUT", "NYMEX"),
            ("ZT", "2_year_treasury_note_FUT", "ECBOT"),
            ("ZQ", "30_day_fed_funds_FUT", "ECBOT"),
            ("ZC", "Corn_FUT", "ECBOT"),
            ("ZW", "Wheat_FUT", "ECBOT"),
            ("ZS", "Soybean_FUT", "ECBOT"),
            ("ZM", "Soybean_meal_FUT", "ECBOT"),
            ("ZL", "Soybean_oil_FUT", "ECBOT"),
            ("ZR", "Rough_rice_FUT", "ECBOT"),
            ("NG", "Natural_gas_FUT", "NYMEX"),
            ("AC", "Ethanol_FUT", "ECBOT"),
            ("BRR", "Bitcoin_FUT", "CMECRYPTO"),
            ("AUD", "AUDUSD_FUT", "GLOBEX"),
            ("JPY", "JPYUSD_FUT", "GLOBEX"),
            ("EUR", "EURUSD_FUT", "GLOBEX"),
            ("GBP", "GBPUSD_FUT", "GLOBEX"),
            ("CAD", "CADUSD_FUT", "GLOBEX"),
            ("NZD", "NZDUSD_FUT", "GLOBEX"),
            ("MXP", "MXPUSD_FUT", "GLOBEX"),
            ("RUR", "RURUSD_FUT", "GLOBEX"),
            ("BRE", "BREUSD_FUT", "GLOBEX"),
            ("ZAR", "ZARUSD_FUT", "GLOBEX"),
            ("SEK", "SEKUSD_FUT", "GLOBEX"),
            ("NOK", "NOKUSD_FUT", "GLOBEX"),
            ("SIR", "Indian_rupee_FUT", "GLOBEX"),
            ("CHF", "CHF_USD_FUT", "GLOBEX"),
            ("IXB", "Materials_Select_Sector_FUT", "GLOBEX"),
            ("IXE", "Energy_Select_Sector_FUT", "GLOBEX"),
            ("IXI", "Industrial_Select_Sector_FUT", "GLOBEX"),
            ("IXM", "Financial_Select_Sector_FUT", "GLOBEX"),
            ("IXR", "Consumer_Staples_Select_Sector_FUT", "GLOBEX"),
            ("IXT", "Technology_Select_Sector_FUT", "GLOBEX"),
            ("IXU", "Utilities_Select_Sector_FUT", "GLOBEX"),
            ("IXY", "Consumer_Discretionary_Select_Sector_FUT", "GLOBEX"),
            ("IXRE", "Real_Estate_Select_Sector_FUT", "GLOBEX"),
            ("GF", "Feeder_Cattle_FUT", "GLOBEX"),
            ("HE", "Lean_Hogs_FUT", "GLOBEX"),
            // Often empty on weekdays; weekend downloads usually work.
            ("HO", "Heating_Oil_FUT", "NYMEX"),
            ("RB", "Gasoline_FUT", "NYMEX"),
            ("PA", "Palladium_FUT", "NYMEX"),
        ]);

        Self {
            forex,
            cfd,
            index,
            cont_futures,
        }
    }
}

fn smart_list(rows: &[(&str, &str, &str)]) -> Vec<SymbolInfo> {
    rows.iter()
        .map(|(symbol, name, currency)| SymbolInfo::new(symbol, name, "SMART", currency))
        .collect()
}

fn usd_list(rows: &[(&str, &str, &str)]) -> Vec<SymbolInfo> {
    rows.iter()
        .map(|(symbol, name, exchange)| SymbolInfo::new(symbol, name, exchange, "USD"))
        .collect()
}
