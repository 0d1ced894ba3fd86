//! `MongoProjectionStore`: persists one document per `instanceId` (spec §6),
//! for deployments where the projection must survive a server restart.

use crate::error::ProjectionError;
use crate::model::{FleetProjectionEntry, SweepReport};
use crate::store::ProjectionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetctl_core::error::Result;
use fleetctl_core::HeartbeatPayload;
use mongodb::bson::{doc, to_bson};
use mongodb::options::FindOneAndReplaceOptions;
use mongodb::Collection;

pub struct MongoProjectionStore {
    collection: Collection<FleetProjectionEntry>,
}

impl MongoProjectionStore {
    pub fn new(collection: Collection<FleetProjectionEntry>) -> Self {
        Self { collection }
    }

    fn map_err(&self, instance_id: impl Into<String>, err: mongodb::error::Error) -> ProjectionError {
        ProjectionError::Backend { instance_id: instance_id.into(), detail: err.to_string() }
    }
}

#[async_trait]
impl ProjectionStore for MongoProjectionStore {
    async fn upsert(&self, payload: HeartbeatPayload, now: DateTime<Utc>) -> Result<()> {
        let instance_id = payload.instance_id.clone();
        let existing = self
            .collection
            .find_one(doc! { "instance_id": &instance_id })
            .await
            .map_err(|err| self.map_err(instance_id.clone(), err))?;

        let entry = match existing {
            Some(mut entry) => {
                entry.apply_heartbeat(payload, now);
                entry
            }
            None => FleetProjectionEntry::from_payload(payload, now),
        };

        self.collection
            .find_one_and_replace(doc! { "instance_id": &instance_id }, &entry)
            .with_options(FindOneAndReplaceOptions::builder().upsert(true).build())
            .await
            .map_err(|err| self.map_err(instance_id, err))?;

        Ok(())
    }

    async fn get(&self, instance_id: &str) -> Result<Option<FleetProjectionEntry>> {
        self.collection
            .find_one(doc! { "instance_id": instance_id })
            .await
            .map_err(|err| self.map_err(instance_id, err).into())
    }

    async fn sweep(&self, now: DateTime<Utc>, miss_threshold: chrono::Duration, retirement_threshold: chrono::Duration) -> Result<SweepReport> {
        use futures::TryStreamExt;

        let mut report = SweepReport::default();
        let mut cursor = self
            .collection
            .find(doc! {})
            .await
            .map_err(|err| self.map_err("<sweep>", err))?;

        while let Some(entry) = cursor.try_next().await.map_err(|err| self.map_err("<sweep>", err))? {
            let age = now - entry.last_seen;
            if age > retirement_threshold {
                self.collection
                    .delete_one(doc! { "instance_id": &entry.instance_id })
                    .await
                    .map_err(|err| self.map_err(entry.instance_id.clone(), err))?;
                report.retired += 1;
                continue;
            }
            if age > miss_threshold {
                let misses = to_bson(&(entry.consecutive_misses + 1)).map_err(|err| ProjectionError::Backend {
                    instance_id: entry.instance_id.clone(),
                    detail: err.to_string(),
                })?;
                self.collection
                    .update_one(doc! { "instance_id": &entry.instance_id }, doc! { "$set": { "consecutive_misses": misses } })
                    .await
                    .map_err(|err| self.map_err(entry.instance_id.clone(), err))?;
                report.missed += 1;
            }
        }

        Ok(report)
    }

    async fn all(&self) -> Result<Vec<FleetProjectionEntry>> {
        use futures::TryStreamExt;

        let cursor = self.collection.find(doc! {}).await.map_err(|err| self.map_err("<all>", err))?;
        cursor.try_collect().await.map_err(|err| self.map_err("<all>", err).into())
    }
}
