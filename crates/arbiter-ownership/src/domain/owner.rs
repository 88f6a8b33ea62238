//! Ownership records and requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::priority::Priority;

/// A request by one execution of a symphony instance to own a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRequest {
    /// The contended resource.
    pub resource_id: String,
    /// The symphony (logical owning unit) making the request.
    pub owner_name: String,
    /// The running instance of that symphony.
    pub instance_id: String,
    /// Arbitration priority of the request.
    pub priority: Priority,
    /// The execution attempt that will hold the resource.
    pub execution_id: String,
}

impl OwnershipRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(
        resource_id: impl Into<String>,
        owner_name: impl Into<String>,
        instance_id: impl Into<String>,
        priority: Priority,
        execution_id: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            owner_name: owner_name.into(),
            instance_id: instance_id.into(),
            priority,
            execution_id: execution_id.into(),
        }
    }

    /// Builds the owner record granted for this request.
    #[must_use]
    pub fn into_owner(self, acquired_at: DateTime<Utc>) -> ResourceOwner {
        ResourceOwner {
            resource_id: self.resource_id,
            owner_name: self.owner_name,
            instance_id: self.instance_id,
            execution_id: self.execution_id,
            priority: self.priority,
            acquired_at,
        }
    }
}

/// An exclusive grant of a resource.
///
/// Records are never edited in place: re-acquisition replaces the whole
/// record, release deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOwner {
    /// The owned resource.
    pub resource_id: String,
    /// The owning symphony.
    pub owner_name: String,
    /// The owning symphony instance.
    pub instance_id: String,
    /// The execution that acquired the resource; releases are verified against it.
    pub execution_id: String,
    /// Priority the resource was acquired at.
    pub priority: Priority,
    /// Acquisition timestamp. Diagnostic only; never used for arbitration.
    pub acquired_at: DateTime<Utc>,
}

impl ResourceOwner {
    /// Whether the request comes from the same symphony instance that holds
    /// this record.
    #[must_use]
    pub fn is_same_instance(&self, request: &OwnershipRequest) -> bool {
        self.owner_name == request.owner_name && self.instance_id == request.instance_id
    }
}
