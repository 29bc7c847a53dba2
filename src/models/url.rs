use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A shortened URL together with its click history.
///
/// `clicks` always equals `click_data.len()`; the store only grows both
/// together through [`ShortUrl::push_click`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortUrl {
    pub id: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub clicks: u64,
    pub click_data: Vec<Click>,
}

/// A single redirect access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Click {
    pub timestamp: DateTime<Utc>,
    pub referrer: String,
    pub location: String,
    pub user_agent: String,
}

impl ShortUrl {
    /// Build a fresh record valid for `validity` from `created_at`.
    ///
    /// Returns `None` when `validity` is not positive or the expiry would
    /// overflow the representable time range.
    pub fn new(
        id: impl Into<String>,
        original_url: impl Into<String>,
        created_at: DateTime<Utc>,
        validity: TimeDelta,
    ) -> Option<Self> {
        if validity <= TimeDelta::zero() {
            return None;
        }
        let expires_at = created_at.checked_add_signed(validity)?;

        Some(Self {
            id: id.into(),
            original_url: original_url.into(),
            created_at,
            expires_at,
            clicks: 0,
            click_data: Vec::new(),
        })
    }

    /// Expiry is exclusive of the boundary instant: a record is still live at
    /// exactly `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub(crate) fn push_click(&mut self, click: Click) {
        self.click_data.push(click);
        self.clicks += 1;
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateShortUrlRequest {
    #[serde(default)]
    pub url: String,
    /// Validity in minutes; absent or non-positive means the configured default.
    #[serde(default)]
    pub validity: Option<i64>,
    #[serde(default)]
    pub shortcode: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShortUrlResponse {
    pub short_link: String,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShortUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlStatsResponse {
    pub shortcode: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub clicks: u64,
    pub click_data: Vec<Click>,
}

impl From<ShortUrl> for UrlStatsResponse {
    fn from(url: ShortUrl) -> Self {
        Self {
            shortcode: url.id,
            original_url: url.original_url,
            created_at: url.created_at,
            expires_at: url.expires_at,
            clicks: url.clicks,
            click_data: url.click_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_non_positive_validity() {
        let now = Utc::now();
        assert!(ShortUrl::new("abc", "https://example.com", now, TimeDelta::zero()).is_none());
        assert!(ShortUrl::new("abc", "https://example.com", now, TimeDelta::minutes(-5)).is_none());
    }

    #[test]
    fn expiry_boundary_is_still_live() {
        let now = Utc::now();
        let url = ShortUrl::new("abc", "https://example.com", now, TimeDelta::minutes(60)).unwrap();

        assert_eq!(url.expires_at, now + TimeDelta::minutes(60));
        assert!(!url.is_expired_at(url.expires_at));
        assert!(url.is_expired_at(url.expires_at + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let now = Utc::now();
        let url = ShortUrl::new("abc", "https://example.com", now, TimeDelta::minutes(1)).unwrap();
        let json = serde_json::to_value(&url).unwrap();

        assert_eq!(json["originalUrl"], "https://example.com");
        assert_eq!(json["clicks"], 0);
        assert!(json["clickData"].as_array().unwrap().is_empty());
        assert!(json.get("expiresAt").is_some());
    }
}
