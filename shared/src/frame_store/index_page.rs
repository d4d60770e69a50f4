//! Parsing of the remote index pages.
//!
//! Each index page embeds its listing as JavaScript statements on a single
//! line beginning with `StatusArr.push`. Per frame the line carries:
//!
//! ```text
//! thumbArr.push("<relative thumbnail url>");
//! UTCArr.push("YYYY-MM-DD<br>HH:MM:SS UTC");
//! ExpArr.push("<exposure>");
//! ```
//!
//! `ExpArr.push` closes a record. Thumbnail URLs become full-size image URLs
//! by dropping their `thumbnails/` component.

use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::record::FrameRecord;
use super::source::PageSource;
use super::FrameStoreError;

const STATUS_LINE_PREFIX: &str = "StatusArr.push";
const UTC_FORMAT: &str = "%Y-%m-%d<br>%H:%M:%S";

/// Where the index lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index page URL with `{}` standing for the page number.
    pub page_url_format: String,

    /// Prefix joined to the relative image URLs found on index pages.
    pub image_url_prefix: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_url_format: "http://pluto.jhuapl.edu/soc/Pluto-Encounter/index.php?page={}"
                .to_string(),
            image_url_prefix: "http://pluto.jhuapl.edu/soc/Pluto-Encounter/".to_string(),
        }
    }
}

impl IndexConfig {
    pub fn page_url(&self, page: usize) -> String {
        self.page_url_format.replace("{}", &page.to_string())
    }
}

/// Text between the first pair of double quotes.
fn quoted(statement: &str) -> Option<&str> {
    statement.split('"').nth(1)
}

fn parse_utc(value: &str) -> Result<i64, FrameStoreError> {
    let malformed = || FrameStoreError::MalformedPage(format!("bad timestamp {value:?}"));

    let (datetime, zone) = value.rsplit_once(' ').ok_or_else(malformed)?;
    if zone != "UTC" {
        return Err(malformed());
    }
    let naive = NaiveDateTime::parse_from_str(datetime, UTC_FORMAT).map_err(|_| malformed())?;
    Ok(Utc.from_utc_datetime(&naive).timestamp())
}

/// Parse every frame record from a `StatusArr.push` line.
pub fn parse_status_line(
    line: &str,
    config: &IndexConfig,
) -> Result<Vec<FrameRecord>, FrameStoreError> {
    let mut records = Vec::new();
    let mut url: Option<String> = None;
    let mut timestamp: Option<i64> = None;

    for statement in line.split(';').map(str::trim) {
        if statement.starts_with("thumbArr.push") {
            let thumb = quoted(statement).ok_or_else(|| {
                FrameStoreError::MalformedPage(format!("unquoted thumbnail in {statement:?}"))
            })?;
            url = Some(format!(
                "{}{}",
                config.image_url_prefix,
                thumb.replace("thumbnails/", "")
            ));
        } else if statement.starts_with("UTCArr.push") {
            let value = quoted(statement).ok_or_else(|| {
                FrameStoreError::MalformedPage(format!("unquoted timestamp in {statement:?}"))
            })?;
            timestamp = Some(parse_utc(value)?);
        } else if statement.starts_with("ExpArr.push") {
            let exposure = quoted(statement).unwrap_or_default().to_string();
            match (url.take(), timestamp.take()) {
                (Some(url), Some(timestamp)) => {
                    records.push(FrameRecord::new(url, timestamp, exposure)?);
                }
                _ => {
                    return Err(FrameStoreError::MalformedPage(
                        "exposure without preceding thumbnail and timestamp".to_string(),
                    ))
                }
            }
        }
    }

    Ok(records)
}

/// Fetch and parse one index page.
///
/// Returns `Ok(None)` for a page without a status line, which marks the end
/// of the index.
pub fn fetch_page<S: PageSource + ?Sized>(
    source: &mut S,
    config: &IndexConfig,
    page: usize,
) -> Result<Option<Vec<FrameRecord>>, FrameStoreError> {
    let body = source.fetch_text(&config.page_url(page))?;

    match body
        .lines()
        .map(str::trim_start)
        .find(|line| line.starts_with(STATUS_LINE_PREFIX))
    {
        Some(line) => parse_status_line(line, config).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_store::source::MemorySource;

    fn status_line(entries: &[(&str, &str, &str)]) -> String {
        let mut line = String::from("StatusArr.push(\"ok\");");
        for (thumb, utc, exposure) in entries {
            line.push_str(&format!(
                "thumbArr.push(\"{thumb}\");UTCArr.push(\"{utc}\");ExpArr.push(\"{exposure}\");"
            ));
        }
        line
    }

    #[test]
    fn test_parse_status_line() {
        let line = status_line(&[
            ("data/thumbnails/lor_1.jpg", "2015-07-14<br>11:49:57 UTC", "150 msec"),
            ("data/thumbnails/lor_2.jpg", "2015-07-13<br>03:00:00 UTC", "0.1 msec"),
        ]);

        let records = parse_status_line(&line, &IndexConfig::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].url,
            "http://pluto.jhuapl.edu/soc/Pluto-Encounter/data/lor_1.jpg"
        );
        assert_eq!(records[0].timestamp, 1_436_874_597);
        assert_eq!(records[0].exposure, "150 msec");
        assert_eq!(records[1].exposure, "0.1 msec");
        assert_eq!(records[1].id(), "2015-07-13_030000_UTC");
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let line = status_line(&[("a.jpg", "2015-07-14 11:49:57 UTC", "1")]);
        assert!(matches!(
            parse_status_line(&line, &IndexConfig::default()),
            Err(FrameStoreError::MalformedPage(_))
        ));

        let line = status_line(&[("a.jpg", "2015-07-14<br>11:49:57 EST", "1")]);
        assert!(parse_status_line(&line, &IndexConfig::default()).is_err());
    }

    #[test]
    fn test_fetch_page_without_status_line_ends_index() {
        let config = IndexConfig::default();
        let mut source = MemorySource::new();
        source.insert(
            config.page_url(1),
            format!(
                "<html>\n  {}\n</html>",
                status_line(&[("t.jpg", "2015-07-14<br>11:49:57 UTC", "1")])
            ),
        );
        source.insert(config.page_url(2), "<html>nothing here</html>");

        assert_eq!(fetch_page(&mut source, &config, 1).unwrap().unwrap().len(), 1);
        assert_eq!(fetch_page(&mut source, &config, 2).unwrap(), None);
        assert_eq!(
            source.requests()[0],
            "http://pluto.jhuapl.edu/soc/Pluto-Encounter/index.php?page=1"
        );
    }
}
