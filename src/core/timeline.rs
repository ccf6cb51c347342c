//! Blocked traffic timeline.
//!
//! The report window is cut into fixed buckets aligned on wall-clock marks
//! (`12:00`, `12:05`, ...) in the dashboard's time zone. Attacked visits add
//! their hits and threats to the bucket of their own rounded-down start
//! time; visits outside the window fall back to the nearest bucket.

use std::collections::BTreeMap;

use chrono::{TimeZone, Timelike};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::visit::Visit;

pub const DEFAULT_BUCKET_MINUTES: u32 = 5;

/// Attacked visit recorded in a timeline bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineVisit {
    pub id: String,
    pub hits: u64,
    pub threats: u64,
    /// Start time (ms)
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineInterval {
    /// Bucket start (ms)
    pub timestamp: i64,
    pub blocked_hits: u64,
    pub total_visits: u64,
    pub threat_count: u64,
    pub visits: Vec<TimelineVisit>,
}

impl TimelineInterval {
    fn empty(timestamp: i64) -> Self {
        Self {
            timestamp,
            blocked_hits: 0,
            total_visits: 0,
            threat_count: 0,
            visits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// `(bucket start ms, blocked hits)` in ascending time order
    pub data: Vec<(i64, u64)>,
    pub intervals: Vec<TimelineInterval>,
}

/// Round a timestamp down to the previous `bucket_minutes` mark of `tz`.
pub fn bucket_start<Tz: TimeZone>(ms: i64, tz: &Tz, bucket_minutes: u32) -> i64 {
    let bucket_minutes = bucket_minutes.max(1);
    let Some(local) = tz.timestamp_millis_opt(ms).single() else {
        return ms;
    };
    let past_mark_ms = i64::from(local.minute() % bucket_minutes) * 60_000
        + i64::from(local.second()) * 1_000
        + i64::from(local.timestamp_subsec_millis().min(999));
    ms - past_mark_ms
}

/// Build the blocked-hits timeline of `[start_ms, end_ms]`
pub fn timeline<Tz: TimeZone>(
    visits: &[Visit],
    start_ms: i64,
    end_ms: i64,
    tz: &Tz,
    bucket_minutes: u32,
) -> Timeline {
    let step = i64::from(bucket_minutes.max(1)) * 60_000;
    let mut buckets: BTreeMap<i64, TimelineInterval> = BTreeMap::new();

    let mut current = bucket_start(start_ms, tz, bucket_minutes);
    while current <= end_ms {
        buckets.insert(current, TimelineInterval::empty(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }

    if buckets.is_empty() {
        debug!("Empty timeline window {}..{}", start_ms, end_ms);
        return Timeline::default();
    }

    for visit in visits {
        let Some(started) = visit.start_time else {
            debug!("Visit {} has no start time", visit.id);
            continue;
        };

        let mark = bucket_start(started, tz, bucket_minutes);
        let key = if buckets.contains_key(&mark) {
            mark
        } else {
            // Ties go to the earlier bucket
            match buckets.keys().min_by_key(|k| k.abs_diff(mark)) {
                Some(nearest) => *nearest,
                None => continue,
            }
        };
        let Some(bucket) = buckets.get_mut(&key) else {
            continue;
        };

        if visit.is_attacked() {
            let threats = visit.total_threats();
            bucket.blocked_hits = bucket.blocked_hits.saturating_add(visit.hits);
            bucket.threat_count = bucket.threat_count.saturating_add(threats);
            bucket.visits.push(TimelineVisit {
                id: visit.id.clone(),
                hits: visit.hits,
                threats,
                time: started,
            });
        }
        bucket.total_visits += 1;
    }

    let intervals: Vec<TimelineInterval> = buckets.into_values().collect();
    let data = intervals
        .iter()
        .map(|interval| (interval.timestamp, interval.blocked_hits))
        .collect();

    debug!(
        "Timeline: {} intervals, {} with blocked hits",
        intervals.len(),
        intervals.iter().filter(|i| i.blocked_hits > 0).count()
    );

    Timeline { data, intervals }
}
