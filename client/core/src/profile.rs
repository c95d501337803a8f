//! Session Profile and Access
//!
//! The small collaborators around the chat core:
//!
//! - [`ProfileClient`] asks the backend who a session cookie belongs to, for
//!   display personalisation only
//! - [`greeting`] builds the time-of-day welcome line
//! - [`access_gate`] decides whether a view may be shown without a session
//! - [`STARTER_PROMPTS`] are the quick actions offered on an empty conversation
//!
//! None of these can fail the chat flow. A profile that cannot be fetched is
//! simply "no personalisation".

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ChatError, Result};

/// Greeting shown while the profile is still being fetched
pub const LOADING_GREETING: &str = "Hello";

/// Greeting used when the local time is unknown
pub const FALLBACK_GREETING: &str = "Good day";

/// The view reachable without a session
pub const UNAUTHENTICATED_PATH: &str = "/unauthenticated";

/// Who a session cookie belongs to
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionProfile {
    /// Whether the backend accepted the session
    pub valid: bool,
    /// Company the user works for
    pub company_name: String,
    /// Given name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// City
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// State or region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// IANA timezone name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Backend location identifier
    pub location_id: String,
    /// Session creation time as sent by the backend
    pub created_at: String,
    /// Backend-issued session identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SessionProfile {
    /// First name, else company name
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.first_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| Some(self.company_name.as_str()).filter(|n| !n.is_empty()))
    }
}

/// Session validation client
#[derive(Clone, Debug)]
pub struct ProfileClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ProfileClient {
    /// Create a client for `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::ClientBuild(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Create from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ClientBuild`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            config.api.endpoint_url.clone(),
            Duration::from_millis(config.api.request_timeout_ms),
        )
    }

    /// Get validation endpoint URL
    fn validate_url(&self) -> String {
        format!("{}/auth/validate_session", self.base_url)
    }

    /// Look up the profile behind a session cookie
    ///
    /// Every failure (no cookie, network, non-2xx, bad body, invalid
    /// session) yields `None`.
    pub async fn validate(&self, session_cookie: Option<&str>) -> Option<SessionProfile> {
        let cookie = session_cookie.filter(|c| !c.is_empty())?;

        let response = match self
            .http_client
            .get(self.validate_url())
            .query(&[("session_id", cookie)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Session validation request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Session rejected");
            return None;
        }

        match response.json::<SessionProfile>().await {
            Ok(profile) if profile.valid => Some(profile),
            Ok(_) => {
                debug!("Session reported invalid");
                None
            }
            Err(e) => {
                debug!(error = %e, "Session profile could not be decoded");
                None
            }
        }
    }
}

/// Time-of-day greeting in the profile's timezone
///
/// `Good morning` before noon, `Good afternoon` before 18:00, else
/// `Good evening`; [`FALLBACK_GREETING`] if there is no profile or its
/// timezone is missing or unknown. A company name is appended when known.
#[must_use]
pub fn greeting(profile: Option<&SessionProfile>, now: DateTime<Utc>) -> String {
    let local_hour = profile
        .and_then(|p| p.timezone.as_deref())
        .and_then(|tz| tz.parse::<Tz>().ok())
        .map(|tz| now.with_timezone(&tz).hour());

    let time_greeting = match local_hour {
        Some(hour) if hour < 12 => "Good morning",
        Some(hour) if hour < 18 => "Good afternoon",
        Some(_) => "Good evening",
        None => FALLBACK_GREETING,
    };

    match profile.map(|p| p.company_name.as_str()).filter(|c| !c.is_empty()) {
        Some(company) => format!("{time_greeting}, {company}"),
        None => time_greeting.to_string(),
    }
}

/// Result of the access check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Show the requested view
    Allow,
    /// Send the user here instead
    Redirect(&'static str),
}

/// Decide whether `path` may be shown
///
/// The unauthenticated view is always allowed; everything else needs a
/// session cookie.
#[must_use]
pub fn access_gate(path: &str, session_cookie: Option<&str>) -> GateDecision {
    if path == UNAUTHENTICATED_PATH {
        return GateDecision::Allow;
    }
    match session_cookie {
        Some(cookie) if !cookie.is_empty() => GateDecision::Allow,
        _ => GateDecision::Redirect(UNAUTHENTICATED_PATH),
    }
}

/// A quick action offered on an empty conversation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StarterPrompt {
    /// Short label
    pub label: &'static str,
    /// Text submitted when chosen
    pub prompt: &'static str,
    /// Decorative icon
    pub icon: &'static str,
}

/// Quick actions, in display order
pub const STARTER_PROMPTS: [StarterPrompt; 3] = [
    StarterPrompt {
        label: "Show Leads",
        prompt: "Show me recent leads from this week",
        icon: "📊",
    },
    StarterPrompt {
        label: "My Schedule",
        prompt: "Show my schedule for today",
        icon: "📅",
    },
    StarterPrompt {
        label: "Create Quote",
        prompt: "Create an estimate for a project",
        icon: "💰",
    },
];
