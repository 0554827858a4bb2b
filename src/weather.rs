//! Current weather lookup

use async_trait::async_trait;
use serde::Deserialize;

use crate::net::check_status;
use crate::{Error, Result};

/// Default `OpenWeatherMap` API root
pub const OPENWEATHERMAP_URL: &str = "https://api.openweathermap.org";

/// Where to look up the weather
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherLocation {
    Coordinates { lat: f64, lon: f64 },
    City { city: String, country: String },
}

impl WeatherLocation {
    /// Label shown until the provider reports a place name
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Coordinates { lat, lon } => format!("{lat:.2},{lon:.2}"),
            Self::City { city, .. } => city.clone(),
        }
    }
}

/// One successful reading; place and temperature always travel together
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub place: String,
    pub temperature_c: f32,
}

/// Source of current conditions
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch the current reading
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unreachable or answers non-success
    async fn fetch(&self) -> Result<WeatherReading>;
}

#[derive(Deserialize)]
struct OwmResponse {
    name: Option<String>,
    main: OwmMain,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: f32,
}

/// `OpenWeatherMap` current weather endpoint
pub struct OpenWeatherMap {
    client: reqwest::Client,
    api_key: String,
    location: WeatherLocation,
    lang: String,
    base_url: String,
}

impl OpenWeatherMap {
    /// Create a client for the given location
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        location: WeatherLocation,
        lang: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenWeatherMap API key required for weather".to_string(),
            ));
        }

        Ok(Self {
            client,
            api_key,
            location,
            lang,
            base_url: OPENWEATHERMAP_URL.to_string(),
        })
    }

    /// Point at a different API root (self-hosted proxy, tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = match &self.location {
            WeatherLocation::Coordinates { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
            WeatherLocation::City { city, country } => vec![("q", format!("{city},{country}"))],
        };
        query.push(("units", "metric".to_string()));
        query.push(("lang", self.lang.clone()));
        query.push(("appid", self.api_key.clone()));
        query
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherMap {
    async fn fetch(&self) -> Result<WeatherReading> {
        let url = format!("{}/data/2.5/weather", self.base_url);

        let response = self.client.get(&url).query(&self.query()).send().await?;

        let response = check_status(response).await.map_err(|e| {
            tracing::warn!(error = %e, "weather API error");
            Error::Weather(e)
        })?;

        let result: OwmResponse = response.json().await?;
        let place = result
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.location.label());

        tracing::debug!(place = %place, temp = result.main.temp, "weather fetched");
        Ok(WeatherReading {
            place,
            temperature_c: result.main.temp,
        })
    }
}
