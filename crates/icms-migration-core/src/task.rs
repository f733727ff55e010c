//! Seeds the workflow tasks migrated cases need to resume in V2.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::value::{FieldValue, Record};

pub const TASK_TABLE: &str = "web_task";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Prepare,
    Process,
    VrRequestChange,
    Authorise,
    DocumentError,
    DocumentSigning,
    ChiefWait,
}

impl TaskType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Process => "process",
            Self::VrRequestChange => "vr_request_change",
            Self::Authorise => "authorise",
            Self::DocumentError => "document_error",
            Self::DocumentSigning => "document_signing",
            Self::ChiefWait => "chief_wait",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prepare" => Some(Self::Prepare),
            "process" => Some(Self::Process),
            "vr_request_change" => Some(Self::VrRequestChange),
            "authorise" => Some(Self::Authorise),
            "document_error" => Some(Self::DocumentError),
            "document_signing" => Some(Self::DocumentSigning),
            "chief_wait" => Some(Self::ChiefWait),
            _ => None,
        }
    }
}

/// Task an in-flight case resumes with. Cases in any other status get none.
#[must_use]
pub fn task_type_for_status(status: &str) -> Option<TaskType> {
    match status {
        "IN_PROGRESS" => Some(TaskType::Prepare),
        "SUBMITTED" | "PROCESSING" => Some(TaskType::Process),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSeed {
    pub process_id: i64,
    pub task_type: TaskType,
}

impl TaskSeed {
    #[must_use]
    pub fn into_record(self, id: i64, created: OffsetDateTime) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), FieldValue::Int(id));
        record.insert("process_id".to_string(), FieldValue::Int(self.process_id));
        record.insert(
            "task_type".to_string(),
            FieldValue::text(self.task_type.as_str()),
        );
        record.insert("is_active".to_string(), FieldValue::Bool(true));
        record.insert("created".to_string(), FieldValue::DateTime(created));
        record.insert("previous_id".to_string(), FieldValue::Null);
        record
    }
}

/// One active task per qualifying `(process_id, status)` case, grouped by
/// task type and ordered by process id within a group.
#[must_use]
pub fn task_batch(cases: &[(i64, FieldValue)]) -> Vec<TaskSeed> {
    let mut seeds: Vec<TaskSeed> = cases
        .iter()
        .filter_map(|(process_id, status)| {
            let task_type = task_type_for_status(status.as_str()?)?;
            Some(TaskSeed {
                process_id: *process_id,
                task_type,
            })
        })
        .collect();
    seeds.sort_by_key(|seed| (seed.task_type, seed.process_id));
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_resumable_tasks() {
        assert_eq!(task_type_for_status("IN_PROGRESS"), Some(TaskType::Prepare));
        assert_eq!(task_type_for_status("SUBMITTED"), Some(TaskType::Process));
        assert_eq!(task_type_for_status("PROCESSING"), Some(TaskType::Process));
        assert_eq!(task_type_for_status("COMPLETED"), None);
        assert_eq!(task_type_for_status("REVOKED"), None);
    }

    #[test]
    fn batch_skips_closed_and_statusless_cases() {
        let cases = vec![
            (3, FieldValue::text("SUBMITTED")),
            (1, FieldValue::text("COMPLETED")),
            (2, FieldValue::text("IN_PROGRESS")),
            (4, FieldValue::Null),
            (5, FieldValue::text("PROCESSING")),
        ];
        let seeds = task_batch(&cases);
        assert_eq!(
            seeds,
            vec![
                TaskSeed { process_id: 2, task_type: TaskType::Prepare },
                TaskSeed { process_id: 3, task_type: TaskType::Process },
                TaskSeed { process_id: 5, task_type: TaskType::Process },
            ]
        );
    }

    #[test]
    fn task_types_round_trip() {
        for task_type in [
            TaskType::Prepare,
            TaskType::Process,
            TaskType::VrRequestChange,
            TaskType::Authorise,
            TaskType::DocumentError,
            TaskType::DocumentSigning,
            TaskType::ChiefWait,
        ] {
            assert_eq!(TaskType::parse(task_type.as_str()), Some(task_type));
        }
    }

    #[test]
    fn seeds_become_active_task_rows() {
        let created = time::macros::datetime!(2024-01-01 00:00 UTC);
        let record = TaskSeed {
            process_id: 9,
            task_type: TaskType::Prepare,
        }
        .into_record(1, created);
        assert_eq!(record.get("task_type"), Some(&FieldValue::text("prepare")));
        assert_eq!(record.get("is_active"), Some(&FieldValue::Bool(true)));
        assert_eq!(record.get("process_id"), Some(&FieldValue::Int(9)));
    }
}
