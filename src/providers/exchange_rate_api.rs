use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::config::{ExchangeRateApiConfig, RateQuotation};
use crate::core::rates::{RateFeed, RateFetchError};
use crate::providers::util::{is_transient, with_retry};

/// Decimal places kept when inverting an indirect quote.
const RATE_PRECISION: u32 = 6;
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Live rates from an exchangerate-api style `GET {base_url}/latest/{BASE}`.
pub struct ExchangeRateApiFeed {
    base_url: String,
    quotation: RateQuotation,
    retries: usize,
    client: reqwest::Client,
}

impl ExchangeRateApiFeed {
    pub fn new(
        base_url: &str,
        quotation: RateQuotation,
        timeout: Duration,
        retries: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent("receipt-fx/0.1")
            .timeout(timeout)
            .build()?;
        Ok(ExchangeRateApiFeed {
            base_url: base_url.trim_end_matches('/').to_string(),
            quotation,
            retries,
            client,
        })
    }

    pub fn from_config(config: &ExchangeRateApiConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.base_url,
            config.quotation,
            Duration::from_secs(config.timeout_secs),
            config.retries,
        )
    }

    /// Converts a quote into units of base per one unit of `currency`.
    fn to_direct(&self, currency: &str, quote: &serde_json::Value) -> Option<Decimal> {
        let Some(quote) = quote.as_f64() else {
            debug!(currency, %quote, "Ignoring non-numeric quote");
            return None;
        };
        let quote = Decimal::from_f64(quote).filter(|q| *q > Decimal::ZERO);
        let Some(quote) = quote else {
            debug!(currency, "Ignoring non-positive quote");
            return None;
        };
        match self.quotation {
            RateQuotation::Direct => Some(quote),
            RateQuotation::Indirect => Decimal::ONE
                .checked_div(quote)
                .map(|rate| rate.round_dp(RATE_PRECISION)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeRateResponse {
    rates: Option<HashMap<String, serde_json::Value>>,
}

#[async_trait]
impl RateFeed for ExchangeRateApiFeed {
    #[instrument(name = "ExchangeRateFetch", skip(self), fields(base = %base))]
    async fn fetch_rates(&self, base: &str) -> Result<HashMap<String, Decimal>, RateFetchError> {
        let url = format!("{}/latest/{}", self.base_url, base);
        debug!("Requesting exchange rates from {}", url);

        let response = with_retry(
            || self.client.get(&url).send(),
            self.retries,
            RETRY_DELAY,
            is_transient,
        )
        .await?;

        if !response.status().is_success() {
            return Err(RateFetchError::Status {
                status: response.status().as_u16(),
                base: base.to_string(),
            });
        }

        let text = response.text().await?;
        let data: ExchangeRateResponse =
            serde_json::from_str(&text).map_err(|source| RateFetchError::Malformed {
                base: base.to_string(),
                source,
            })?;

        let quotes = data
            .rates
            .filter(|rates| !rates.is_empty())
            .ok_or_else(|| RateFetchError::MissingRates(base.to_string()))?;

        let rates: HashMap<String, Decimal> = quotes
            .into_iter()
            .filter_map(|(currency, quote)| {
                let currency = currency.to_uppercase();
                self.to_direct(&currency, &quote).map(|rate| (currency, rate))
            })
            .collect();
        debug!("Received {} usable quote(s)", rates.len());
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(response: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest/JPY"))
            .respond_with(response)
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn feed(server: &MockServer, quotation: RateQuotation) -> ExchangeRateApiFeed {
        ExchangeRateApiFeed::new(&server.uri(), quotation, Duration::from_secs(5), 0).unwrap()
    }

    #[tokio::test]
    async fn test_indirect_quotes_are_inverted() {
        let body = r#"{"base": "JPY", "rates": {"JPY": 1, "USD": 0.008, "myr": 0.032}}"#;
        let server = create_mock_server(ResponseTemplate::new(200).set_body_string(body)).await;

        let rates = feed(&server, RateQuotation::Indirect)
            .fetch_rates("JPY")
            .await
            .unwrap();
        assert_eq!(rates["USD"], dec!(125));
        assert_eq!(rates["MYR"], dec!(31.25));
        assert_eq!(rates["JPY"], Decimal::ONE);
    }

    #[tokio::test]
    async fn test_direct_quotes_pass_through() {
        let body = r#"{"rates": {"USD": 151.25, "XXX": 0}}"#;
        let server = create_mock_server(ResponseTemplate::new(200).set_body_string(body)).await;

        let rates = feed(&server, RateQuotation::Direct)
            .fetch_rates("JPY")
            .await
            .unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates["USD"], dec!(151.25));
    }

    #[tokio::test]
    async fn test_bad_entries_are_skipped() {
        let body = r#"{"rates": {"USD": 0.008, "THB": null, "EUR": "n/a", "MYR": 0.032}}"#;
        let server = create_mock_server(ResponseTemplate::new(200).set_body_string(body)).await;

        let rates = feed(&server, RateQuotation::Indirect)
            .fetch_rates("JPY")
            .await
            .unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates["USD"], dec!(125));
        assert_eq!(rates["MYR"], dec!(31.25));
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let server = create_mock_server(ResponseTemplate::new(500)).await;

        let result = feed(&server, RateQuotation::Indirect).fetch_rates("JPY").await;
        let err = result.unwrap_err();
        assert!(matches!(err, RateFetchError::Status { status: 500, .. }));
        assert_eq!(err.to_string(), "HTTP error: 500 for base currency: JPY");
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let server =
            create_mock_server(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
                .await;

        let err = feed(&server, RateQuotation::Indirect)
            .fetch_rates("JPY")
            .await
            .unwrap_err();
        assert!(matches!(err, RateFetchError::Malformed { .. }));
        assert!(
            err.to_string()
                .contains("Failed to parse rate response for JPY")
        );
    }

    #[tokio::test]
    async fn test_missing_rates() {
        let body = r#"{"result": "error", "error-type": "unsupported-code"}"#;
        let server = create_mock_server(ResponseTemplate::new(200).set_body_string(body)).await;

        let err = feed(&server, RateQuotation::Indirect)
            .fetch_rates("JPY")
            .await
            .unwrap_err();
        assert!(matches!(err, RateFetchError::MissingRates(ref base) if base == "JPY"));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let response = ResponseTemplate::new(200)
            .set_body_string(r#"{"rates": {"USD": 0.008}}"#)
            .set_delay(Duration::from_millis(500));
        let server = create_mock_server(response).await;
        let feed = ExchangeRateApiFeed::new(
            &server.uri(),
            RateQuotation::Indirect,
            Duration::from_millis(50),
            0,
        )
        .unwrap();

        let err = feed.fetch_rates("JPY").await.unwrap_err();
        match err {
            RateFetchError::Request(e) => assert!(e.is_timeout()),
            other => panic!("expected a request error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest/JPY"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"rates": {"USD": 0.008}}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/JPY"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rates": {"USD": 0.008}}"#))
            .mount(&server)
            .await;

        let feed = ExchangeRateApiFeed::new(
            &server.uri(),
            RateQuotation::Indirect,
            Duration::from_millis(100),
            1,
        )
        .unwrap();
        let rates = feed.fetch_rates("JPY").await.unwrap();
        assert_eq!(rates["USD"], dec!(125));
    }
}
