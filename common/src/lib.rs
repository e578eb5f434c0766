#![warn(clippy::nursery, clippy::pedantic)]

//! Contains the wire types shared by the Fleeting server and its CLI.

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use headers::{Header, HeaderName, HeaderValue};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
pub use url::Url;

pub use crate::id::{Generator, ParseIdError, PasteId};

mod id;

pub const PASTES_PATH: &str = "/api/pastes";
pub const HEALTH_PATH: &str = "/api/healthz";
/// Prefix of the public share link, `{public_url}/p/{id}`.
pub const SHARE_PATH: &str = "/p";

/// Body of `POST /api/pastes`.
///
/// The limits are signed on purpose: `0` and negative values must reach
/// validation and come back as a descriptive `400` rather than a decode error.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreatePaste {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_views: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreatedPaste {
    pub id: PasteId,
    pub url: String,
}

/// A successfully consumed view.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PasteView {
    pub content: String,
    pub remaining_views: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of the non-consuming availability check.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub remaining_views: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Why a paste could not be viewed. Only ever used for wording; access is
/// decided by the consume operation alone.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Unavailability {
    NotFound,
    Expired,
    MaxViewsReached,
}

impl Unavailability {
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::NotFound => "Paste not found",
            Self::Expired | Self::MaxViewsReached => "Paste unavailable",
        }
    }
}

impl Display for Unavailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "No paste exists with this id."),
            Self::Expired => write!(f, "This paste has expired."),
            Self::MaxViewsReached => write!(f, "This paste has reached its view limit."),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UnavailableBody {
    pub error: String,
    pub reason: Unavailability,
    pub message: String,
}

impl From<Unavailability> for UnavailableBody {
    fn from(reason: Unavailability) -> Self {
        Self {
            error: reason.title().to_string(),
            reason,
            message: reason.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Health {
    pub ok: bool,
}

lazy_static! {
    pub static ref CLOCK_OVERRIDE_HEADER_NAME: HeaderName =
        HeaderName::from_static("x-test-now-ms");
}

/// Replaces the server clock for a single request, in milliseconds since the
/// Unix epoch. Servers ignore it unless started with the override enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockOverride(pub DateTime<Utc>);

impl Header for ClockOverride {
    fn name() -> &'static HeaderName {
        &CLOCK_OVERRIDE_HEADER_NAME
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        let millis = values
            .next()
            .ok_or_else(headers::Error::invalid)?
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(headers::Error::invalid)?;

        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Self)
            .ok_or_else(headers::Error::invalid)
    }

    fn encode<E: Extend<HeaderValue>>(&self, container: &mut E) {
        container.extend(std::iter::once(HeaderValue::from(
            self.0.timestamp_millis(),
        )));
    }
}
