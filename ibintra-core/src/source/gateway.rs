//! Brokerage web-API gateway data source.
//!
//! Talks to the locally running gateway over HTTPS with a blocking client.
//! The session is opened once with [`GatewaySession::connect`] and logged out
//! when dropped, so the brokerage session is released on every exit path.
//!
//! One request per window, no retries: a failed window is the driver's
//! problem, and re-running the plan is the recovery path.

use super::{HistoricalDataSource, RawBar, SourceError};
use crate::config::GatewayConfig;
use crate::instrument::{ContractSpec, FieldSelector, InstrumentClass};
use crate::plan::RequestDescriptor;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct AuthStatus {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct SecdefEntry {
    conid: serde_json::Value,
    #[serde(default)]
    symbol: Option<String>,
    /// Only some entries list it.
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    sections: Vec<SecdefSection>,
}

#[derive(Debug, Deserialize)]
struct SecdefSection {
    #[serde(rename = "secType")]
    sec_type: String,
    /// Semicolon-separated venue list, e.g. `"SMART;CBOE"`.
    #[serde(default)]
    exchange: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FutureContract {
    conid: i64,
    #[serde(rename = "expirationDate")]
    expiration_date: i64,
}

/// History response. Only the bar array matters here.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Option<Vec<HistoryBar>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryBar {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
}

/// An authenticated session against the local gateway.
pub struct GatewaySession {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl GatewaySession {
    /// Build the HTTP client and confirm the gateway is logged in.
    pub fn connect(config: &GatewayConfig) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(format!(
                "ibintra/{} (client {})",
                env!("CARGO_PKG_VERSION"),
                config.client_id
            ))
            .build()
            .map_err(|e| SourceError::NetworkUnreachable(format!("HTTP client: {e}")))?;

        let session = Self {
            client,
            base_url: config.base_url(),
        };

        let status: AuthStatus = session.post_json("/iserver/auth/status")?;
        if !status.authenticated || !status.connected {
            return Err(SourceError::AuthenticationRequired(format!(
                "gateway at {} is not logged in (authenticated={}, connected={})",
                session.base_url, status.authenticated, status.connected
            )));
        }

        tracing::info!(
            base_url = %session.base_url,
            mode = ?config.mode,
            client_id = config.client_id,
            "gateway session open"
        );
        Ok(session)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn post_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let resp = self
            .client
            .post(self.url(path))
            .send()
            .map_err(|e| SourceError::NetworkUnreachable(e.to_string()))?;
        Self::decode(path, resp)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let resp = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .map_err(|e| SourceError::NetworkUnreachable(e.to_string()))?;
        Self::decode(path, resp)
    }

    fn decode<T: DeserializeOwned>(
        path: &str,
        resp: reqwest::blocking::Response,
    ) -> Result<T, SourceError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SourceError::AuthenticationRequired(format!(
                "{path} rejected the session"
            )));
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .map_err(|e| SourceError::ResponseFormatChanged(format!("{path}: {e}")))
    }

    /// Gateway contract id for a request, looked up unless overridden.
    fn resolve_conid(&self, request: &RequestDescriptor) -> Result<i64, SourceError> {
        if let Some(conid) = request.conid() {
            return Ok(conid);
        }

        let contract = request.class().contract(&request.symbol_info());
        let conid = match request.class() {
            InstrumentClass::ContinuousFutures => {
                let as_of = reference_date(request.end_timestamp(), &contract, today());
                self.future_for_window(&contract, as_of)?
            }
            InstrumentClass::Forex | InstrumentClass::Cfd | InstrumentClass::Index => {
                let lookup = lookup_symbol(request.class(), &contract);
                let entries: Vec<SecdefEntry> = self.get_json(
                    "/iserver/secdef/search",
                    &[
                        ("symbol", lookup.clone()),
                        ("secType", contract.sec_type.to_string()),
                    ],
                )?;
                pick_secdef(&entries, &lookup, &contract)
            }
        };
        conid.ok_or_else(|| SourceError::ContractNotFound {
            symbol: lookup_symbol(request.class(), &contract),
            sec_type: format!("{} on {}", contract.sec_type, contract.exchange),
        })
    }

    /// Futures contract that was trading at `as_of` (`YYYYMMDD`).
    ///
    /// The gateway has no continuous series, so each window gets the nearest
    /// contract expiring on or after its end date.
    fn future_for_window(
        &self,
        contract: &ContractSpec,
        as_of: i64,
    ) -> Result<Option<i64>, SourceError> {
        let mut query = vec![("symbols", contract.symbol.clone())];
        if !is_smart(&contract.exchange) {
            query.push(("exchange", contract.exchange.clone()));
        }
        let chains: HashMap<String, Vec<FutureContract>> =
            self.get_json("/trsrv/futures", &query)?;

        Ok(chains
            .get(&contract.symbol)
            .and_then(|chain| pick_future(chain, as_of)))
    }
}

impl HistoricalDataSource for GatewaySession {
    fn name(&self) -> &str {
        "gateway"
    }

    fn fetch_bars(&self, request: &RequestDescriptor) -> Result<Vec<RawBar>, SourceError> {
        let conid = self.resolve_conid(request)?;
        let mut query = vec![
            ("conid", conid.to_string()),
            ("period", period_param(request.duration())?),
            ("bar", bar_param(request.bar_size())?),
            ("barType", bar_type_param(request.field_selector()).to_string()),
            // Regular-hours-only bars leave futures incomplete.
            ("outsideRth", "true".to_string()),
        ];
        if let Some(end) = request.end_timestamp() {
            query.push(("startTime", start_time_param(end)));
            query.push(("direction", "-1".to_string()));
        }

        tracing::debug!(symbol = request.symbol(), conid, ?query, "history request");
        let resp: HistoryResponse = self.get_json("/hmds/history", &query)?;
        parse_history(request.symbol(), resp)
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        match self.client.post(self.url("/logout")).send() {
            Ok(resp) => tracing::debug!(status = %resp.status(), "gateway session closed"),
            Err(e) => tracing::debug!(error = %e, "gateway logout failed"),
        }
    }
}

fn lookup_symbol(class: InstrumentClass, contract: &ContractSpec) -> String {
    match class {
        InstrumentClass::Forex => format!("{}.{}", contract.symbol, contract.currency),
        _ => contract.symbol.clone(),
    }
}

/// Exact symbol match only, on the contract's security type, venue and currency.
fn pick_secdef(entries: &[SecdefEntry], lookup: &str, contract: &ContractSpec) -> Option<i64> {
    entries
        .iter()
        .filter(|e| {
            e.symbol
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(lookup))
        })
        .filter(|e| {
            e.currency
                .as_deref()
                .map_or(true, |c| c.eq_ignore_ascii_case(&contract.currency))
        })
        .find(|e| {
            e.sections.iter().any(|s| {
                s.sec_type == contract.sec_type
                    && venue_listed(s.exchange.as_deref(), &contract.exchange)
            })
        })
        .and_then(|e| conid_value(&e.conid))
}

fn is_smart(venue: &str) -> bool {
    venue.eq_ignore_ascii_case("SMART")
}

/// SMART routes anywhere; an unlisted venue is not held against the entry.
fn venue_listed(listed: Option<&str>, venue: &str) -> bool {
    if is_smart(venue) {
        return true;
    }
    match listed {
        Some(listed) => listed
            .split(';')
            .any(|v| v.trim().eq_ignore_ascii_case(venue)),
        None => true,
    }
}

/// Nearest contract expiring on or after `as_of`.
fn pick_future(chain: &[FutureContract], as_of: i64) -> Option<i64> {
    chain
        .iter()
        .filter(|c| c.expiration_date >= as_of)
        .min_by_key(|c| c.expiration_date)
        .map(|c| c.conid)
}

/// Date a window's contract must be alive at, as `YYYYMMDD`.
///
/// Windows ending in the past only reach back to that date when the contract
/// allows expired contracts; otherwise the current front month is used.
fn reference_date(end_timestamp: Option<&str>, contract: &ContractSpec, today: i64) -> i64 {
    if !contract.include_expired {
        return today;
    }
    end_timestamp
        .and_then(|end| end.get(..8))
        .and_then(|day| day.parse().ok())
        .unwrap_or(today)
}

fn today() -> i64 {
    Utc::now()
        .date_naive()
        .format("%Y%m%d")
        .to_string()
        .parse()
        .unwrap_or_default()
}

/// The search endpoint returns conids as either numbers or strings.
fn conid_value(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `"360 D"` → `"360d"`.
fn period_param(duration: &str) -> Result<String, SourceError> {
    let (count, unit) = split_count_unit(duration)?;
    let unit = match unit.to_ascii_uppercase().as_str() {
        "S" => "s",
        "D" => "d",
        "W" => "w",
        "M" => "m",
        "Y" => "y",
        _ => {
            return Err(SourceError::InvalidRequest(format!(
                "unsupported duration unit in '{duration}'"
            )))
        }
    };
    Ok(format!("{count}{unit}"))
}

/// `"1 hour"` → `"1h"`, `"30 mins"` → `"30min"`.
fn bar_param(bar_size: &str) -> Result<String, SourceError> {
    let (count, unit) = split_count_unit(bar_size)?;
    let unit = match unit.to_ascii_lowercase().trim_end_matches('s') {
        "sec" => "s",
        "min" => "min",
        "hour" => "h",
        "day" => "d",
        "week" => "w",
        "month" => "m",
        _ => {
            return Err(SourceError::InvalidRequest(format!(
                "unsupported bar size '{bar_size}'"
            )))
        }
    };
    Ok(format!("{count}{unit}"))
}

fn bar_type_param(selector: FieldSelector) -> &'static str {
    match selector {
        FieldSelector::Midpoint => "midpoint",
        FieldSelector::Trades => "last",
    }
}

/// `"20170410 06:00:00"` → `"20170410-06:00:00"`.
fn start_time_param(end_timestamp: &str) -> String {
    end_timestamp.trim().replacen(' ', "-", 1)
}

fn split_count_unit(value: &str) -> Result<(u32, &str), SourceError> {
    let mut parts = value.split_whitespace();
    let count = parts
        .next()
        .and_then(|c| c.parse::<u32>().ok())
        .ok_or_else(|| {
            SourceError::InvalidRequest(format!("expected '<count> <unit>': '{value}'"))
        })?;
    let unit = parts
        .next()
        .ok_or_else(|| SourceError::InvalidRequest(format!("missing unit in '{value}'")))?;
    Ok((count, unit))
}

fn parse_history(symbol: &str, resp: HistoryResponse) -> Result<Vec<RawBar>, SourceError> {
    if let Some(err) = resp.error {
        return Err(SourceError::NoData(format!("{symbol}: {err}")));
    }
    let data = resp
        .data
        .ok_or_else(|| SourceError::ResponseFormatChanged(format!("{symbol}: no data array")))?;

    data.into_iter()
        .map(|bar| {
            let stamp = DateTime::<Utc>::from_timestamp_millis(bar.t).ok_or_else(|| {
                SourceError::ResponseFormatChanged(format!("invalid timestamp: {}", bar.t))
            })?;
            Ok(RawBar {
                date: stamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                open: bar.o,
                high: bar.h,
                low: bar.l,
                close: bar.c,
                volume: bar.v,
                average: None,
                bar_count: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::SymbolInfo;

    #[test]
    fn maps_duration_to_period() {
        assert_eq!(period_param("360 D").unwrap(), "360d");
        assert_eq!(period_param("5 D").unwrap(), "5d");
        assert_eq!(period_param("2 W").unwrap(), "2w");
        assert!(period_param("5").is_err());
        assert!(period_param("5 Q").is_err());
    }

    #[test]
    fn maps_bar_size() {
        assert_eq!(bar_param("1 hour").unwrap(), "1h");
        assert_eq!(bar_param("4 hours").unwrap(), "4h");
        assert_eq!(bar_param("30 mins").unwrap(), "30min");
        assert_eq!(bar_param("1 day").unwrap(), "1d");
        assert!(bar_param("1 fortnight").is_err());
    }

    #[test]
    fn maps_selector_and_end_time() {
        assert_eq!(bar_type_param(FieldSelector::Midpoint), "midpoint");
        assert_eq!(bar_type_param(FieldSelector::Trades), "last");
        assert_eq!(start_time_param("20170410 06:00:00"), "20170410-06:00:00");
    }

    #[test]
    fn parses_history_bars() {
        let json = r#"{
            "symbol": "EUR.USD",
            "data": [
                {"t": 1492507800000, "o": 1.1, "h": 1.2, "l": 1.0, "c": 1.15, "v": -1},
                {"t": 1492511400000, "o": 1.15, "h": 1.25, "l": 1.05, "c": 1.2}
            ]
        }"#;
        let resp: HistoryResponse = serde_json::from_str(json).unwrap();
        let bars = parse_history("EURUSD", resp).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, "2017-04-18 09:30:00");
        assert_eq!(bars[0].volume, -1.0);
        assert_eq!(bars[1].date, "2017-04-18 10:30:00");
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn history_error_is_no_data() {
        let resp: HistoryResponse =
            serde_json::from_str(r#"{"error": "HMDS query returned no data"}"#).unwrap();
        let err = parse_history("HG", resp).unwrap_err();
        assert!(matches!(err, SourceError::NoData(_)));
    }

    fn contract_for(class: InstrumentClass, info: &SymbolInfo) -> ContractSpec {
        class.contract(info)
    }

    #[test]
    fn secdef_requires_exact_symbol() {
        let entries: Vec<SecdefEntry> = serde_json::from_str(
            r#"[
                {"conid": "12087792", "symbol": "EUR.USD", "sections": [{"secType": "CASH"}]},
                {"conid": 14433401, "symbol": "EUR.GBP", "sections": [{"secType": "CASH"}]}
            ]"#,
        )
        .unwrap();
        let eurusd = contract_for(InstrumentClass::Forex, &SymbolInfo::forex("EURUSD"));
        let eurjpy = contract_for(InstrumentClass::Forex, &SymbolInfo::forex("EURJPY"));

        assert_eq!(pick_secdef(&entries, "eur.usd", &eurusd), Some(12087792));
        // A same-type neighbour never stands in for the requested pair.
        assert_eq!(pick_secdef(&entries, "EUR.JPY", &eurjpy), None);
    }

    #[test]
    fn secdef_requires_matching_sec_type() {
        let entries: Vec<SecdefEntry> = serde_json::from_str(
            r#"[{"conid": 416904, "symbol": "SPX", "sections": [{"secType": "OPT"}]}]"#,
        )
        .unwrap();
        let spx = contract_for(
            InstrumentClass::Index,
            &SymbolInfo::new("SPX", "S&P500_Ind", "CBOE", "USD"),
        );
        assert_eq!(pick_secdef(&entries, "SPX", &spx), None);
    }

    #[test]
    fn secdef_venue_selects_listing() {
        let entries: Vec<SecdefEntry> = serde_json::from_str(
            r#"[
                {"conid": 1935181, "symbol": "INDU",
                 "sections": [{"secType": "IND", "exchange": "NYSE"}]},
                {"conid": 13455763, "symbol": "INDU",
                 "sections": [{"secType": "IND", "exchange": "CME;CBOT"}]}
            ]"#,
        )
        .unwrap();
        let on = |venue: &str| {
            let info = SymbolInfo::new("INDU", "DowJonesIndustrialAverage_Ind", venue, "USD");
            pick_secdef(&entries, "INDU", &contract_for(InstrumentClass::Index, &info))
        };

        assert_eq!(on("CME"), Some(13455763));
        assert_eq!(on("NYSE"), Some(1935181));
        assert_eq!(on("CBOE"), None);
        // SMART accepts the first exact listing.
        assert_eq!(on("SMART"), Some(1935181));
    }

    #[test]
    fn secdef_currency_must_match_when_listed() {
        let entries: Vec<SecdefEntry> = serde_json::from_str(
            r#"[
                {"conid": 111, "symbol": "IBDE30", "currency": "USD",
                 "sections": [{"secType": "CFD"}]},
                {"conid": 222, "symbol": "IBDE30", "currency": "EUR",
                 "sections": [{"secType": "CFD", "exchange": "SMART"}]}
            ]"#,
        )
        .unwrap();
        let dax = contract_for(
            InstrumentClass::Cfd,
            &SymbolInfo::new("IBDE30", "Dax30_CFD", "SMART", "EUR"),
        );
        assert_eq!(pick_secdef(&entries, "IBDE30", &dax), Some(222));
    }

    #[test]
    fn future_covers_window_end() {
        let chain: Vec<FutureContract> = serde_json::from_str(
            r#"[
                {"conid": 1, "expirationDate": 20170616},
                {"conid": 2, "expirationDate": 20170915},
                {"conid": 3, "expirationDate": 20240315}
            ]"#,
        )
        .unwrap();
        assert_eq!(pick_future(&chain, 20170410), Some(1));
        assert_eq!(pick_future(&chain, 20170616), Some(1));
        assert_eq!(pick_future(&chain, 20170701), Some(2));
        assert_eq!(pick_future(&chain, 20250101), None);
    }

    #[test]
    fn continuous_futures_window_dates() {
        let es = SymbolInfo::new("ES", "S&P_500_Mini_FUT", "GLOBEX", "USD");
        let contfut = contract_for(InstrumentClass::ContinuousFutures, &es);
        let index = contract_for(InstrumentClass::Index, &es);

        assert_eq!(reference_date(Some("20151120 08:00:00"), &contfut, 20261015), 20151120);
        assert_eq!(reference_date(None, &contfut, 20261015), 20261015);
        assert_eq!(reference_date(Some("bogus"), &contfut, 20261015), 20261015);
        // Without expired contracts every window uses the current front month.
        assert_eq!(reference_date(Some("20151120 08:00:00"), &index, 20261015), 20261015);
    }

    #[test]
    fn forex_lookup_uses_dotted_pair() {
        let info = SymbolInfo::forex("USDJPY");
        let contract = InstrumentClass::Forex.contract(&info);
        assert_eq!(lookup_symbol(InstrumentClass::Forex, &contract), "USD.JPY");
    }
}
