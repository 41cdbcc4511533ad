//! Suspend-point records for runs parked at a blocking activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::context::SystemContext;
use crate::domain::request::Request;

/// Value object: process instance ID, owned by the external process engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessInstanceId(pub String);

/// Value object: activity ID within a flow definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub String);

/// Value object: task instance ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

/// Key addressing exactly one pending suspension
///
/// Resolution of a signal is keyed strictly by process instance and
/// activity; two unrelated instances can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    /// The suspended process instance
    pub process_instance_id: ProcessInstanceId,
    /// The activity at which execution is parked
    pub activity_id: ActivityId,
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.process_instance_id.0, self.activity_id.0)
    }
}

/// The suspend-point record
///
/// Captures everything needed to resume later with an externally produced
/// value: the process instance, the parked activity, and the original
/// request and system context in effect at suspension time. These are not
/// re-derived from caller state on resume.
#[derive(Debug, Clone)]
pub struct TaskInstance {
    /// Unique task identifier
    pub id: TaskId,
    /// The suspended process instance
    pub process_instance_id: ProcessInstanceId,
    /// The activity at which execution is parked
    pub activity_id: ActivityId,
    /// The original request, captured by value
    pub request: Request,
    /// The system context in effect at suspension time
    pub system_context: SystemContext,
    /// Suspension timestamp
    pub created_at: DateTime<Utc>,
}

impl TaskInstance {
    /// Record a new suspension
    pub fn new(
        process_instance_id: ProcessInstanceId,
        activity_id: ActivityId,
        request: Request,
        system_context: SystemContext,
    ) -> Self {
        Self {
            id: TaskId(Uuid::new_v4().to_string()),
            process_instance_id,
            activity_id,
            request,
            system_context,
            created_at: Utc::now(),
        }
    }

    /// The addressing key for this suspension
    pub fn key(&self) -> TaskKey {
        TaskKey {
            process_instance_id: self.process_instance_id.clone(),
            activity_id: self.activity_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Payload;

    #[test]
    fn test_task_key_addressing() {
        let request = Request::sync(Payload::null());
        let context = SystemContext::from_request(&request);
        let task = TaskInstance::new(
            ProcessInstanceId("p1".to_string()),
            ActivityId("wait".to_string()),
            request,
            context,
        );

        let key = task.key();
        assert_eq!(key.process_instance_id.0, "p1");
        assert_eq!(key.activity_id.0, "wait");
        assert_eq!(key.to_string(), "p1/wait");

        let other = TaskKey {
            process_instance_id: ProcessInstanceId("p2".to_string()),
            activity_id: ActivityId("wait".to_string()),
        };
        assert_ne!(key, other);
    }
}
