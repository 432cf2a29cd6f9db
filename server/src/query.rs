use crate::db::SensorStore;
use crate::errors::{Error, Result};
use crate::model::TelemetryRecord;
use bson::{doc, Document};
use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;
use serde::Serialize;
use tracing::info;

/// Summary counters over the whole record set.
#[derive(Debug, Serialize)]
pub struct Statistics {
    #[serde(rename = "totalDevices")]
    pub total_devices: usize,
    /// Distinct devices with a record in the trailing 5-minute window.
    #[serde(rename = "activeDevices")]
    pub active_devices: usize,
    #[serde(rename = "criticalCount")]
    pub critical_count: u64,
    #[serde(rename = "dangerCount")]
    pub danger_count: u64,
    #[serde(rename = "warningCount")]
    pub warning_count: u64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

const ACTIVE_WINDOW_MINUTES: i64 = 5;

impl SensorStore {
    /// The most recent record per distinct device.
    ///
    /// When several records share a device's maximum timestamp, which one
    /// wins depends on storage iteration order and is unspecified.
    pub async fn latest_per_device(&self) -> Result<Vec<TelemetryRecord>> {
        let records: Vec<TelemetryRecord> = self
            .collection()
            .aggregate(latest_pipeline())
            .with_type::<TelemetryRecord>()
            .await?
            .try_collect()
            .await?;

        info!(devices = records.len(), "latest-per-device view computed");
        Ok(records)
    }

    /// One device's records, newest first, inclusive time bounds.
    pub async fn history(
        &self,
        device_id: &str,
        from: Option<&str>,
        to: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TelemetryRecord>> {
        let filter = history_filter(device_id, parse_bounds(from, to)?);

        let records: Vec<TelemetryRecord> = self
            .collection()
            .find(filter)
            .sort(doc! { "timestamp": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;

        info!(device_id, count = records.len(), "history retrieved");
        Ok(records)
    }

    /// Records at danger or critical severity, newest first.
    pub async fn alerts(&self, limit: i64) -> Result<Vec<TelemetryRecord>> {
        let records: Vec<TelemetryRecord> = self
            .collection()
            .find(alerts_filter())
            .sort(doc! { "timestamp": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;

        info!(count = records.len(), "alerts retrieved");
        Ok(records)
    }

    pub async fn statistics(&self) -> Result<Statistics> {
        let coll = self.collection();

        let total_devices = coll.distinct("deviceId", doc! {}).await?.len();

        let cutoff = Utc::now() - Duration::minutes(ACTIVE_WINDOW_MINUTES);
        let active_devices = coll
            .distinct(
                "deviceId",
                doc! { "timestamp": { "$gte": bson::DateTime::from_chrono(cutoff) } },
            )
            .await?
            .len();

        let critical_count = coll.count_documents(doc! { "severity": "critical" }).await?;
        let danger_count = coll.count_documents(doc! { "severity": "danger" }).await?;
        let warning_count = coll.count_documents(doc! { "severity": "warning" }).await?;

        Ok(Statistics {
            total_devices,
            active_devices,
            critical_count,
            danger_count,
            warning_count,
            last_updated: Utc::now(),
        })
    }

    /// Bulk-removes records matching the optional device and time filters.
    /// No filter removes everything; callers gate this behind the admin
    /// role.
    pub async fn delete_records(
        &self,
        device_id: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<u64> {
        let filter = delete_filter(device_id, parse_bounds(from, to)?);
        let deleted = self.collection().delete_many(filter).await?.deleted_count;

        info!(deleted, "records deleted");
        Ok(deleted)
    }
}

/// Parses an ISO-8601 time bound; anything unparseable is an
/// `InvalidRangeError`.
pub fn parse_time_bound(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidRange(format!("'{}' is not an ISO-8601 timestamp", value)))
}

fn parse_bounds(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let from = from.map(parse_time_bound).transpose()?;
    let to = to.map(parse_time_bound).transpose()?;
    Ok((from, to))
}

fn time_clause(bounds: (Option<DateTime<Utc>>, Option<DateTime<Utc>>)) -> Option<Document> {
    let mut clause = Document::new();
    if let Some(from) = bounds.0 {
        clause.insert("$gte", bson::DateTime::from_chrono(from));
    }
    if let Some(to) = bounds.1 {
        clause.insert("$lte", bson::DateTime::from_chrono(to));
    }
    (!clause.is_empty()).then_some(clause)
}

fn history_filter(
    device_id: &str,
    bounds: (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
) -> Document {
    let mut filter = doc! { "deviceId": device_id };
    if let Some(clause) = time_clause(bounds) {
        filter.insert("timestamp", clause);
    }
    filter
}

fn alerts_filter() -> Document {
    doc! { "severity": { "$in": ["danger", "critical"] } }
}

fn delete_filter(
    device_id: Option<&str>,
    bounds: (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
) -> Document {
    let mut filter = Document::new();
    if let Some(device_id) = device_id {
        filter.insert("deviceId", device_id);
    }
    if let Some(clause) = time_clause(bounds) {
        filter.insert("timestamp", clause);
    }
    filter
}

fn latest_pipeline() -> Vec<Document> {
    vec![
        doc! { "$sort": { "timestamp": -1 } },
        doc! { "$group": { "_id": "$deviceId", "latestData": { "$first": "$$ROOT" } } },
        doc! { "$replaceRoot": { "newRoot": "$latestData" } },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_time_bound_accepts_iso8601() {
        let parsed = parse_time_bound("2026-08-23T10:00:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 8, 23, 10, 0, 0).unwrap());

        // Offset forms normalize to UTC.
        let offset = parse_time_bound("2026-08-23T17:00:00+07:00").unwrap();
        assert_eq!(offset, parsed);
    }

    #[test]
    fn test_parse_time_bound_rejects_garbage() {
        for bad in ["yesterday", "2026-13-99", "", "1724400000000"] {
            assert!(matches!(
                parse_time_bound(bad),
                Err(Error::InvalidRange(_))
            ));
        }
    }

    #[test]
    fn test_history_filter_without_bounds() {
        let filter = history_filter("dev-1", (None, None));
        assert_eq!(filter, doc! { "deviceId": "dev-1" });
    }

    #[test]
    fn test_history_filter_with_bounds() {
        let from = parse_time_bound("2026-08-23T00:00:00Z").unwrap();
        let to = parse_time_bound("2026-08-23T12:00:00Z").unwrap();
        let filter = history_filter("dev-1", (Some(from), Some(to)));

        let clause = filter.get_document("timestamp").unwrap();
        assert_eq!(
            clause.get_datetime("$gte").unwrap(),
            &bson::DateTime::from_chrono(from)
        );
        assert_eq!(
            clause.get_datetime("$lte").unwrap(),
            &bson::DateTime::from_chrono(to)
        );
    }

    #[test]
    fn test_delete_filter_empty_matches_everything() {
        assert_eq!(delete_filter(None, (None, None)), Document::new());
    }

    #[test]
    fn test_delete_filter_device_only() {
        let filter = delete_filter(Some("dev-9"), (None, None));
        assert_eq!(filter, doc! { "deviceId": "dev-9" });
    }

    #[test]
    fn test_alerts_filter_targets_danger_and_critical() {
        assert_eq!(
            alerts_filter(),
            doc! { "severity": { "$in": ["danger", "critical"] } }
        );
    }

    #[test]
    fn test_latest_pipeline_shape() {
        let pipeline = latest_pipeline();
        assert_eq!(pipeline.len(), 3);
        assert!(pipeline[0].contains_key("$sort"));
        assert!(pipeline[1].contains_key("$group"));
        assert!(pipeline[2].contains_key("$replaceRoot"));
    }
}
