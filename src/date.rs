//! Publication dates as delivered by the content API and their display form.

use chrono::{DateTime, FixedOffset, Locale};
use serde::{Deserialize, Deserializer};

/// The timestamp format used by the content API, e.g.
/// `2021-03-25T19:25:28+0000`.
const API_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Day, abbreviated month, and year, e.g. `15 Mar 2024` (or `15 mar 2024`
/// for `pt_BR`).
const DISPLAY_FORMAT: &str = "%-d %b %Y";

/// The first publication date of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicationDate(DateTime<FixedOffset>);

impl PublicationDate {
    /// Parses a timestamp in the content API's format, falling back to RFC
    /// 3339. Returns [`None`] for values that are neither; an unparseable date
    /// is not fatal, the page simply renders without one.
    pub fn parse(s: &str) -> Option<PublicationDate> {
        match DateTime::parse_from_str(s, API_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(s))
        {
            Ok(date) => Some(PublicationDate(date)),
            Err(err) => {
                tracing::warn!(value = s, error = %err, "ignoring malformed publication date");
                None
            }
        }
    }

    /// Formats the date for display in the given locale.
    pub fn format(&self, locale: Locale) -> String {
        self.0.format_localized(DISPLAY_FORMAT, locale).to_string()
    }
}

/// Formats an optional date. A missing date formats as [`None`] so callers
/// can omit it.
pub fn format_optional(date: Option<&PublicationDate>, locale: Locale) -> Option<String> {
    date.map(|date| date.format(locale))
}

/// Deserializes a nullable timestamp string. Both `null` and a malformed
/// value produce [`None`].
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<PublicationDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .as_deref()
        .and_then(PublicationDate::parse))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_api_format() {
        let date = PublicationDate::parse("2024-03-15T10:30:00+0000").unwrap();
        assert_eq!("15 Mar 2024", date.format(Locale::en_US));
    }

    #[test]
    fn test_parse_rfc3339() {
        let date = PublicationDate::parse("2021-04-01T08:00:00-03:00").unwrap();
        assert_eq!("1 Apr 2021", date.format(Locale::en_US));
    }

    #[test]
    fn test_format_localized() {
        let date = PublicationDate::parse("2024-03-15T10:30:00+0000").unwrap();
        assert_eq!("15 mar 2024", date.format(Locale::pt_BR));
    }

    #[test]
    fn test_malformed_date_is_none() {
        assert_eq!(None, PublicationDate::parse("not a date"));
        assert_eq!(None, PublicationDate::parse(""));
    }

    #[test]
    fn test_format_optional_missing() {
        assert_eq!(None, format_optional(None, Locale::en_US));
    }

    #[test]
    fn test_deserialize_optional() {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(deserialize_with = "deserialize_optional")]
            date: Option<PublicationDate>,
        }

        let doc: Doc = serde_json::from_str(r#"{"date": null}"#).unwrap();
        assert_eq!(None, doc.date);

        let doc: Doc = serde_json::from_str(r#"{"date": "garbage"}"#).unwrap();
        assert_eq!(None, doc.date);

        let doc: Doc = serde_json::from_str(r#"{"date": "2024-03-15T10:30:00+0000"}"#).unwrap();
        assert!(doc.date.is_some());
    }
}
