//! `MongoApprovalStore` / `MongoDecisionStore`: the `approval_requests` /
//! `approval_decisions` collections from spec §6, with the former's
//! `version` optimistic-lock field and the latter's compound unique index
//! over `(requestId, approverUserId, gate)`.

use crate::error::ApprovalBackendError;
use crate::store::{ApprovalStore, DecisionStore, InsertOutcome, Mutator};
use crate::types::{ApprovalDecision, ApprovalRequest};
use async_trait::async_trait;
use fleetctl_core::error::{FleetError, Result};
use fleetctl_core::ids::RequestId;
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::ReturnDocument;
use mongodb::{Collection, IndexModel};

/// Mongo's well-known duplicate-key error code, used to distinguish a
/// unique-index violation on insert from any other backend failure.
const DUPLICATE_KEY_CODE: i32 = 11000;

pub struct MongoApprovalStore {
    collection: Collection<ApprovalRequest>,
}

impl MongoApprovalStore {
    pub fn new(collection: Collection<ApprovalRequest>) -> Self {
        Self { collection }
    }

    /// Creates the index spec §6 requires on `requiredGates` gate names for
    /// `$in` filtering. Callers invoke this once during composition-root
    /// startup; it is not run implicitly by `new` so tests can skip it.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder().keys(doc! { "required.gate": 1 }).build();
        self.collection
            .create_index(index)
            .await
            .map_err(|err| ApprovalBackendError::Backend { request_id: "<index>".into(), detail: err.to_string() })?;
        Ok(())
    }

    fn map_err(&self, request_id: impl Into<String>, err: mongodb::error::Error) -> FleetError {
        ApprovalBackendError::Backend { request_id: request_id.into(), detail: err.to_string() }.into()
    }
}

#[async_trait]
impl ApprovalStore for MongoApprovalStore {
    async fn insert(&self, request: ApprovalRequest) -> Result<()> {
        self.collection.insert_one(&request).await.map_err(|err| self.map_err(request.id.as_str(), err))?;
        Ok(())
    }

    async fn get(&self, id: &RequestId) -> Result<Option<ApprovalRequest>> {
        self.collection.find_one(doc! { "id": id.as_str() }).await.map_err(|err| self.map_err(id.as_str(), err))
    }

    async fn compare_and_swap(&self, id: &RequestId, expected_version: u64, mutator: Mutator) -> Result<ApprovalRequest> {
        let mut request = self.get(id).await?.ok_or_else(|| FleetError::not_found("approval.request_not_found", id.as_str()))?;
        if request.version != expected_version {
            return Err(FleetError::conflict("approval.version_mismatch", format!("expected version {expected_version}, stored version {}", request.version)));
        }
        mutator(&mut request);
        request.version = expected_version + 1;

        let updated = self
            .collection
            .find_one_and_replace(doc! { "id": id.as_str(), "version": expected_version as i64 }, &request)
            .with_options(mongodb::options::FindOneAndReplaceOptions::builder().return_document(ReturnDocument::After).build())
            .await
            .map_err(|err| self.map_err(id.as_str(), err))?;

        updated.ok_or_else(|| FleetError::conflict("approval.version_mismatch", format!("request {id} version moved on under concurrent write")))
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        use futures::TryStreamExt;

        let cursor = self.collection.find(doc! { "status": "PENDING" }).await.map_err(|err| self.map_err("<list_pending>", err))?;
        cursor.try_collect().await.map_err(|err| self.map_err("<list_pending>", err))
    }
}

pub struct MongoDecisionStore {
    collection: Collection<ApprovalDecision>,
}

impl MongoDecisionStore {
    pub fn new(collection: Collection<ApprovalDecision>) -> Self {
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "request_id": 1, "approver_user_id": 1, "gate": 1 })
            .options(mongodb::options::IndexOptions::builder().unique(true).build())
            .build();
        self.collection
            .create_index(index)
            .await
            .map_err(|err| ApprovalBackendError::Backend { request_id: "<index>".into(), detail: err.to_string() })?;
        Ok(())
    }

    fn map_err(&self, request_id: impl Into<String>, err: mongodb::error::Error) -> FleetError {
        ApprovalBackendError::Backend { request_id: request_id.into(), detail: err.to_string() }.into()
    }

    fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
        matches!(err.kind.as_ref(), ErrorKind::Write(mongodb::error::WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY_CODE)
    }
}

#[async_trait]
impl DecisionStore for MongoDecisionStore {
    async fn insert(&self, decision: ApprovalDecision) -> Result<InsertOutcome> {
        match self.collection.insert_one(&decision).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if Self::is_duplicate_key(&err) => {
                let existing = self
                    .collection
                    .find_one(doc! {
                        "request_id": decision.request_id.as_str(),
                        "approver_user_id": decision.approver_user_id.as_str(),
                        "gate": decision.gate.as_str(),
                    })
                    .await
                    .map_err(|err| self.map_err(decision.request_id.as_str(), err))?
                    .ok_or_else(|| FleetError::conflict("approval.duplicate_decision", "duplicate key reported but no existing decision found"))?;
                Ok(InsertOutcome::Duplicate(existing))
            }
            Err(err) => Err(self.map_err(decision.request_id.as_str(), err)),
        }
    }

    async fn list_for_request(&self, request_id: &RequestId) -> Result<Vec<ApprovalDecision>> {
        use futures::TryStreamExt;

        let cursor = self
            .collection
            .find(doc! { "request_id": request_id.as_str() })
            .await
            .map_err(|err| self.map_err(request_id.as_str(), err))?;
        cursor.try_collect().await.map_err(|err| self.map_err(request_id.as_str(), err))
    }
}
