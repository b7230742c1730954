use crate::pipeline::dedup::ExistingUrlIndex;
use crate::types::ScrapedEvent;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

const DATE_SEPARATOR: char = '~';
const DATE_FORMAT: &str = "%Y.%m.%d";

/// Why the filter kept or dropped an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    MissingKeyword,
    Ended(NaiveDate),
    AlreadyStored,
}

/// Parsed end of a `"<start> ~ <end>"` range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndDate {
    /// No range, or a range without the separator
    Absent,
    Parsed(NaiveDate),
    Malformed(String),
}

impl EndDate {
    pub fn from_range(date_range: Option<&str>) -> Self {
        let Some(range) = date_range else {
            return EndDate::Absent;
        };
        let Some((_, end)) = range.rsplit_once(DATE_SEPARATOR) else {
            return EndDate::Absent;
        };
        let end = end.trim();
        match NaiveDate::parse_from_str(end, DATE_FORMAT) {
            Ok(date) => EndDate::Parsed(date),
            Err(_) => EndDate::Malformed(end.to_string()),
        }
    }
}

/// Per-reason counts from one filter pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub missing_keyword: usize,
    pub ended: usize,
    pub already_stored: usize,
    /// Kept despite an unreadable end date
    pub malformed_dates: usize,
}

/// Keyword, freshness and dedup gates over scraped events.
///
/// All three gates must pass. Order is preserved.
#[derive(Debug, Clone)]
pub struct EventFilter {
    keywords: Vec<String>,
}

impl EventFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_keyword(&self, title: &str) -> bool {
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }

    /// Run all gates against one event
    pub fn evaluate(
        &self,
        event: &ScrapedEvent,
        index: &ExistingUrlIndex,
        today: NaiveDate,
    ) -> FilterDecision {
        if !self.has_keyword(&event.title) {
            return FilterDecision::MissingKeyword;
        }

        match EndDate::from_range(event.date_range.as_deref()) {
            EndDate::Parsed(end) if end < today => return FilterDecision::Ended(end),
            EndDate::Malformed(raw) => {
                warn!("⚠️ Date parsing failed for \"{}\": {} (keeping event)", event.title, raw);
            }
            _ => {}
        }

        if index.contains(&event.detail_url) {
            return FilterDecision::AlreadyStored;
        }

        FilterDecision::Keep
    }

    /// Filter a candidate list, returning survivors and per-reason counts
    pub fn apply(
        &self,
        events: Vec<ScrapedEvent>,
        index: &ExistingUrlIndex,
        today: NaiveDate,
    ) -> (Vec<ScrapedEvent>, FilterStats) {
        let mut stats = FilterStats::default();
        let mut kept = Vec::new();

        for event in events {
            if matches!(
                EndDate::from_range(event.date_range.as_deref()),
                EndDate::Malformed(_)
            ) {
                stats.malformed_dates += 1;
            }

            match self.evaluate(&event, index, today) {
                FilterDecision::Keep => {
                    stats.kept += 1;
                    kept.push(event);
                }
                FilterDecision::MissingKeyword => {
                    debug!("Skipping event without keyword: \"{}\"", event.title);
                    stats.missing_keyword += 1;
                }
                FilterDecision::Ended(end) => {
                    info!("⏭️ Skipping ended event: \"{}\" (ended: {})", event.title, end);
                    stats.ended += 1;
                }
                FilterDecision::AlreadyStored => {
                    debug!("Skipping already stored event: {}", event.detail_url);
                    stats.already_stored += 1;
                }
            }
        }

        (kept, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EVENT_KEYWORDS;

    fn filter() -> EventFilter {
        EventFilter::new(EVENT_KEYWORDS)
    }

    fn event(title: &str, range: Option<&str>, url: &str) -> ScrapedEvent {
        ScrapedEvent {
            title: title.into(),
            detail_url: url.into(),
            date_range: range.map(Into::into),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn end_date_parses_trailing_component() {
        assert_eq!(
            EndDate::from_range(Some("2024.01.01 ~ 2024.02.01")),
            EndDate::Parsed(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
        );
        assert_eq!(
            EndDate::from_range(Some("2024.1.1~2024.2.3")),
            EndDate::Parsed(NaiveDate::from_ymd_opt(2024, 2, 3).unwrap())
        );
    }

    #[test]
    fn end_date_without_separator_is_absent() {
        assert_eq!(EndDate::from_range(None), EndDate::Absent);
        assert_eq!(EndDate::from_range(Some("2024.01.01")), EndDate::Absent);
    }

    #[test]
    fn end_date_garbage_is_malformed() {
        assert_eq!(
            EndDate::from_range(Some("2024.01.01 ~ 상시")),
            EndDate::Malformed("상시".into())
        );
        assert!(matches!(
            EndDate::from_range(Some("2024.01.01 ~ 2024.13.40")),
            EndDate::Malformed(_)
        ));
    }

    #[test]
    fn keyword_match_is_case_sensitive_substring() {
        let f = EventFilter::new(["Art"]);
        assert!(f.has_keyword("Special Art Card"));
        assert!(!f.has_keyword("special art card"));
    }

    #[test]
    fn event_ending_today_is_kept() {
        let e = event("아트카드 증정", Some("2024.06.01 ~ 2024.06.15"), "u1");
        assert_eq!(
            filter().evaluate(&e, &ExistingUrlIndex::default(), today()),
            FilterDecision::Keep
        );
    }

    #[test]
    fn event_ended_yesterday_is_dropped() {
        let e = event("아트카드 증정", Some("2024.06.01 ~ 2024.06.14"), "u1");
        assert_eq!(
            filter().evaluate(&e, &ExistingUrlIndex::default(), today()),
            FilterDecision::Ended(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap())
        );
    }

    #[test]
    fn malformed_date_fails_open() {
        let e = event("스페셜 포스터", Some("상시 ~ 소진시"), "u1");
        assert_eq!(
            filter().evaluate(&e, &ExistingUrlIndex::default(), today()),
            FilterDecision::Keep
        );
    }

    #[test]
    fn dedup_wins_regardless_of_date() {
        let index: ExistingUrlIndex = ["u1".to_string()].into_iter().collect();
        let e = event("시그니처 아트카드", Some("2099.01.01 ~ 2099.12.31"), "u1");
        assert_eq!(
            filter().evaluate(&e, &index, today()),
            FilterDecision::AlreadyStored
        );
    }

    #[test]
    fn apply_preserves_order_and_counts_reasons() {
        let index: ExistingUrlIndex = ["stored".to_string()].into_iter().collect();
        let events = vec![
            event("B 증정", Some("2099.01.01 ~ 2099.12.31"), "b"),
            event("일반 공지", None, "x"),
            event("A 스페셜", Some("2000.01.01 ~ 2000.01.02"), "a"),
            event("C 시그니처", Some("??? ~ ???"), "c"),
            event("D 아트카드", None, "stored"),
        ];

        let (kept, stats) = filter().apply(events, &index, today());

        let urls: Vec<&str> = kept.iter().map(|e| e.detail_url.as_str()).collect();
        assert_eq!(urls, vec!["b", "c"]);
        assert_eq!(
            stats,
            FilterStats {
                kept: 2,
                missing_keyword: 1,
                ended: 1,
                already_stored: 1,
                malformed_dates: 1,
            }
        );
    }
}
