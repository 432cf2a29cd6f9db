use crate::errors::{Error, Result};
use crate::model::TelemetryRecord;
use bson::doc;
use bson::oid::ObjectId;
use mongodb::{Client, Collection, IndexModel};
use tracing::info;

const COLLECTION: &str = "sensor_data";

/// Connects to MongoDB and verifies the server is reachable.
pub async fn connect(uri: &str, db_name: &str) -> Result<SensorStore> {
    info!("Connecting to MongoDB...");
    let client = Client::with_uri_str(uri).await?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await?;
    info!(db = db_name, "MongoDB connection established");

    let collection = client
        .database(db_name)
        .collection::<TelemetryRecord>(COLLECTION);

    Ok(SensorStore { client, collection })
}

/// Append-only gateway over the `sensor_data` collection.
#[derive(Clone)]
pub struct SensorStore {
    client: Client,
    collection: Collection<TelemetryRecord>,
}

impl SensorStore {
    pub fn collection(&self) -> &Collection<TelemetryRecord> {
        &self.collection
    }

    /// Establishes the access paths the query engine relies on. Safe to
    /// call on every startup; MongoDB treats existing indexes as a no-op.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let keys = [
            doc! { "deviceId": -1 },
            doc! { "timestamp": -1 },
            doc! { "severity": -1 },
            doc! { "deviceId": -1, "timestamp": -1 },
        ];

        for key in keys {
            self.collection
                .create_index(IndexModel::builder().keys(key).build())
                .await?;
        }

        info!("sensor_data indexes ensured");
        Ok(())
    }

    /// Durably appends one record. No retry or queuing; a failed write is
    /// surfaced to the caller and the sensor retries on its own schedule.
    pub async fn insert(&self, record: &TelemetryRecord) -> Result<ObjectId> {
        let result = self.collection.insert_one(record).await?;
        result.inserted_id.as_object_id().ok_or_else(|| {
            Error::Persistence(mongodb::error::Error::custom(
                "insert returned a non-ObjectId id",
            ))
        })
    }

    /// Round-trip liveness check used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}
