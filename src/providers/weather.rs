//! Weather provider client (OpenWeather-style API).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::WeatherSettings;
use crate::error::{CorralError, Result};

/// Weather API client for current conditions and daily forecasts.
pub struct WeatherClient {
    settings: WeatherSettings,
    http: reqwest::Client,
}

/// One observation or forecast entry, already flattened for formatting.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherData {
    pub location: String,
    pub temperature: f64,
    pub description: String,
    pub humidity: i64,
    pub wind_speed: f64,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    #[serde(default)]
    name: String,
    main: MainBlock,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
    #[serde(default)]
    wind: WindBlock,
    #[serde(default)]
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastEntry>,
    city: ForecastCity,
}

#[derive(Debug, Deserialize)]
struct ForecastCity {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    main: MainBlock,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
    #[serde(default)]
    wind: WindBlock,
    /// "YYYY-MM-DD HH:MM:SS"
    #[serde(default)]
    dt_txt: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    #[serde(default)]
    temp: f64,
    #[serde(default)]
    humidity: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ConditionBlock {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct WindBlock {
    #[serde(default)]
    speed: f64,
}

impl WeatherClient {
    pub fn new(settings: WeatherSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { settings, http })
    }

    /// Current conditions for a city.
    pub async fn current(&self, city: &str) -> Result<WeatherData> {
        debug!(city, "fetching current weather");

        let response: CurrentResponse = self
            .http
            .get(format!("{}/weather", self.settings.base_url))
            .query(&[
                ("q", city),
                ("appid", &self.settings.api_key),
                ("units", "metric"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let timestamp = chrono::DateTime::from_timestamp(response.dt, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();

        Ok(WeatherData {
            location: if response.name.is_empty() {
                city.to_string()
            } else {
                response.name
            },
            temperature: response.main.temp,
            description: response
                .weather
                .first()
                .map(|w| w.description.clone())
                .unwrap_or_default(),
            humidity: response.main.humidity,
            wind_speed: response.wind.speed,
            timestamp,
        })
    }

    /// Daily forecast for up to `days` days.
    ///
    /// The upstream API returns 3-hour slices; one representative entry is
    /// kept per calendar day.
    pub async fn forecast(&self, city: &str, days: usize) -> Result<Vec<WeatherData>> {
        debug!(city, days, "fetching weather forecast");

        let response: ForecastResponse = self
            .http
            .get(format!("{}/forecast", self.settings.base_url))
            .query(&[
                ("q", city),
                ("appid", &self.settings.api_key),
                ("units", "metric"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let location = if response.city.name.is_empty() {
            city.to_string()
        } else {
            response.city.name
        };

        let daily = pick_daily(&response.list, days);
        if daily.is_empty() {
            return Err(CorralError::Internal(format!(
                "no forecast data returned for {}",
                city
            )));
        }

        Ok(daily
            .into_iter()
            .map(|entry| WeatherData {
                location: location.clone(),
                temperature: entry.main.temp,
                description: entry
                    .weather
                    .first()
                    .map(|w| w.description.clone())
                    .unwrap_or_default(),
                humidity: entry.main.humidity,
                wind_speed: entry.wind.speed,
                timestamp: entry.dt_txt.clone(),
            })
            .collect())
    }
}

/// Keep the first entry of each calendar day, up to `days` days.
fn pick_daily(entries: &[ForecastEntry], days: usize) -> Vec<&ForecastEntry> {
    let mut picked: Vec<&ForecastEntry> = Vec::with_capacity(days);
    let mut last_date = "";
    for entry in entries {
        let date = entry.dt_txt.split_whitespace().next().unwrap_or("");
        if date.is_empty() || date == last_date {
            continue;
        }
        picked.push(entry);
        last_date = date;
        if picked.len() == days {
            break;
        }
    }
    picked
}
