//! Daily horoscope side flow: sign and day parsing plus the lookup client.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use baatein_core::config::HoroscopeConfig;
use baatein_core::error::BaateinError;

use crate::error::{Result, TelegramError};

// =============================================================================
// Sign / Day
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl Sign {
    pub const ALL: [Sign; 12] = [
        Sign::Aries,
        Sign::Taurus,
        Sign::Gemini,
        Sign::Cancer,
        Sign::Leo,
        Sign::Virgo,
        Sign::Libra,
        Sign::Scorpio,
        Sign::Sagittarius,
        Sign::Capricorn,
        Sign::Aquarius,
        Sign::Pisces,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Sign::Aries => "Aries",
            Sign::Taurus => "Taurus",
            Sign::Gemini => "Gemini",
            Sign::Cancer => "Cancer",
            Sign::Leo => "Leo",
            Sign::Virgo => "Virgo",
            Sign::Libra => "Libra",
            Sign::Scorpio => "Scorpio",
            Sign::Sagittarius => "Sagittarius",
            Sign::Capricorn => "Capricorn",
            Sign::Aquarius => "Aquarius",
            Sign::Pisces => "Pisces",
        }
    }
}

impl std::fmt::Display for Sign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sign {
    type Err = String;

    /// Case-insensitive match on the sign's name.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Sign::ALL
            .into_iter()
            .find(|sign| sign.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown zodiac sign: {}", s))
    }
}

/// Which day's horoscope to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Day {
    Today,
    Tomorrow,
    Yesterday,
    Date(NaiveDate),
}

impl Day {
    /// Value of the `day` query parameter.
    pub fn as_query(&self) -> String {
        match self {
            Day::Today => "TODAY".to_string(),
            Day::Tomorrow => "TOMORROW".to_string(),
            Day::Yesterday => "YESTERDAY".to_string(),
            Day::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "today" => Ok(Day::Today),
            "tomorrow" => Ok(Day::Tomorrow),
            "yesterday" => Ok(Day::Yesterday),
            _ => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Day::Date)
                .map_err(|_| format!("unrecognized day: {}", s)),
        }
    }
}

// =============================================================================
// Lookup
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DailyHoroscope {
    pub date: String,
    pub horoscope_data: String,
}

#[derive(Deserialize)]
struct HoroscopeResponse {
    data: DailyHoroscope,
}

/// Markdown reply for a fetched horoscope.
pub fn format_horoscope(horoscope: &DailyHoroscope, sign: Sign) -> String {
    format!(
        "*Horoscope:* {}\n*Sign:* {}\n*Day:* {}",
        horoscope.horoscope_data, sign, horoscope.date
    )
}

#[async_trait]
pub trait HoroscopeSource: Send + Sync {
    async fn daily(&self, sign: Sign, day: Day) -> Result<DailyHoroscope>;
}

/// Client for the public horoscope-app API.
#[derive(Debug, Clone)]
pub struct HoroscopeClient {
    base_url: String,
    client: reqwest::Client,
}

impl HoroscopeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> std::result::Result<Self, BaateinError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BaateinError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn from_config(config: &HoroscopeConfig) -> std::result::Result<Self, BaateinError> {
        Self::new(config.base_url.clone(), Duration::from_secs(15))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/api/v1/get-horoscope/daily",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl HoroscopeSource for HoroscopeClient {
    async fn daily(&self, sign: Sign, day: Day) -> Result<DailyHoroscope> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("sign", sign.as_str().to_string()), ("day", day.as_query())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TelegramError::Api {
                code: i64::from(status.as_u16()),
                description: body,
            });
        }

        let parsed: HoroscopeResponse =
            serde_json::from_str(&body).map_err(|e| TelegramError::Api {
                code: i64::from(status.as_u16()),
                description: format!("unexpected horoscope response: {}", e),
            })?;
        tracing::debug!(%sign, date = %parsed.data.date, "Horoscope fetched");
        Ok(parsed.data)
    }
}
