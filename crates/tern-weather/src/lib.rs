//! # tern-weather
//!
//! Current-weather lookup against the OpenWeather API.
//!
//! One GET, three fields out (temperature, description, wind speed),
//! rendered into a fixed three-line report. Failures are not retried;
//! the caller decides what to show the user.

use serde::Deserialize;
use tern_core::{config::WeatherConfig, error::TernError};
use tracing::debug;

const API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

// --- OpenWeather response subset ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    main: MainBlock,
    #[serde(default)]
    weather: Vec<WeatherBlock>,
    wind: WindBlock,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherBlock {
    description: String,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    speed: f64,
}

/// The three fields Tern renders.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub temp: f64,
    pub description: String,
    pub wind_speed: f64,
}

impl WeatherReport {
    /// Fixed-layout message body.
    pub fn render(&self) -> String {
        format!(
            "Temperature: {:.1}°C\nWeather: {}\nWind: {:.1} m/s",
            self.temp, self.description, self.wind_speed
        )
    }
}

fn report_from_response(body: ApiResponse) -> Result<WeatherReport, TernError> {
    let description = body
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or_else(|| TernError::Weather("weather response missing description".into()))?;

    Ok(WeatherReport {
        temp: body.main.temp,
        description,
        wind_speed: body.wind.speed,
    })
}

/// OpenWeather client for a fixed, configured city.
pub struct WeatherClient {
    config: WeatherConfig,
    client: reqwest::Client,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// The city this client reports on.
    pub fn city(&self) -> &str {
        &self.config.city
    }

    /// Fetch current weather for the configured city.
    pub async fn fetch(&self) -> Result<WeatherReport, TernError> {
        let resp = self
            .client
            .get(API_URL)
            .query(&[
                ("q", self.config.city.as_str()),
                ("appid", self.config.api_key.as_str()),
                ("units", self.config.units.as_str()),
                ("lang", self.config.lang.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TernError::Weather(format!("weather request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TernError::Weather(format!("weather API returned {status}")));
        }

        let body: ApiResponse = resp
            .json()
            .await
            .map_err(|e| TernError::Weather(format!("weather parse failed: {e}")))?;

        let report = report_from_response(body)?;
        debug!("weather: {} {:.1}°C", self.config.city, report.temp);
        Ok(report)
    }
}
