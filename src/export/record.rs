//! Exported row model and its tabular rendering

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Header row of every artifact, in column order.
pub const COLUMNS: [&str; 10] = [
    "Path",
    "Title",
    "Event",
    "Bot",
    "Session",
    "Referrer",
    "Browser",
    "Screen size",
    "Location",
    "Date",
];

/// Tenant that owns an export.
///
/// The code is used verbatim in the artifact file name, so it is restricted
/// to ASCII alphanumerics, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub code: String,
}

impl Tenant {
    pub fn new(id: i64, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }

    /// Check that the code is safe to embed in a file name
    pub fn validate(&self) -> Result<()> {
        let valid = !self.code.is_empty()
            && self
                .code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(ExportError::InvalidTenant(self.code.clone()).into())
        }
    }
}

/// One recorded pageview or event.
///
/// Records are immutable once fetched and ordered by `id`, which the source
/// assigns. The id drives paging but is not part of the exported row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub event: bool,
    #[serde(default)]
    pub bot: u8,
    #[serde(default)]
    pub session: u64,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub browser: String,
    #[serde(default)]
    pub screen_size: Option<(f64, f64)>,
    #[serde(default)]
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Render the record as one artifact row, in [`COLUMNS`] order
    pub fn to_row(&self) -> [String; 10] {
        [
            self.path.clone(),
            self.title.clone(),
            self.event.to_string(),
            self.bot.to_string(),
            self.session.to_string(),
            self.referrer.clone(),
            self.browser.clone(),
            format_screen_size(self.screen_size),
            self.location.clone(),
            format_timestamp(&self.created_at),
        ]
    }
}

/// Join a screen size as `width,height`, or an empty string when absent.
///
/// Numbers use their shortest decimal form: `1920` rather than `1920.0`.
pub fn format_screen_size(size: Option<(f64, f64)>) -> String {
    match size {
        Some((w, h)) => format!("{},{}", w, h),
        None => String::new(),
    }
}

/// RFC 3339 in UTC with whole seconds, e.g. `2024-03-01T12:00:00Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn sample() -> Record {
        Record {
            id: 7,
            path: "/blog/hello".to_string(),
            title: "Hello, world".to_string(),
            event: false,
            bot: 0,
            session: 42,
            referrer: "https://example.com".to_string(),
            browser: "Firefox/128".to_string(),
            screen_size: Some((1920.0, 1080.0)),
            location: "NL".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_row_rendering() {
        let row = sample().to_row();
        assert_eq!(
            row,
            [
                "/blog/hello",
                "Hello, world",
                "false",
                "0",
                "42",
                "https://example.com",
                "Firefox/128",
                "1920,1080",
                "NL",
                "2024-03-01T12:00:00Z",
            ]
        );
    }

    #[test]
    fn test_absent_and_fractional_screen_size() {
        assert_eq!(format_screen_size(None), "");
        assert_eq!(format_screen_size(Some((1.5, 2.0))), "1.5,2");
    }

    #[test]
    fn test_timestamp_drops_subseconds() {
        let ts = Utc
            .with_ymd_and_hms(2023, 12, 31, 23, 59, 59)
            .unwrap()
            .with_nanosecond(123_000_000)
            .unwrap();
        assert_eq!(format_timestamp(&ts), "2023-12-31T23:59:59Z");
    }

    #[test]
    fn test_tenant_validation() {
        assert!(Tenant::new(1, "acme-corp_2").validate().is_ok());
        assert!(Tenant::new(1, "").validate().is_err());
        assert!(Tenant::new(1, "../etc").validate().is_err());
        assert!(Tenant::new(1, "a/b").validate().is_err());
    }

    #[test]
    fn test_record_from_json_defaults() {
        let record: Record = serde_json::from_str(
            r#"{"id": 3, "path": "/", "created_at": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(record.screen_size, None);
        assert!(!record.event);
        assert_eq!(record.to_row()[7], "");
    }
}
