//! Load job submission and polling.
//!
//! Submits the bulk-load job with fixed dispositions (the table must already
//! exist, and its contents are fully replaced) and polls until the job goes
//! terminal. Intermediate statistics are logged as progress; they are
//! monitoring output, not a correctness signal.

use std::time::Duration;

use crate::dest::{
    CreateDisposition, JobState, LoadRequest, LoadStatistics, SourceFormat, Warehouse,
    WriteDisposition,
};
use crate::error::ExportError;
use crate::stream::EncodedRows;
use crate::types::{TableId, TableSchema};

/// Fixed delay between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Submit the load job and drive it to a terminal state.
///
/// # Errors
///
/// Returns [`ExportError::JobSubmission`]/[`ExportError::JobPoll`] on
/// transport failures (never retried here) and [`ExportError::JobFailed`]
/// with the destination's error detail on terminal failure.
pub async fn run_load<W: Warehouse>(
    warehouse: &W,
    table: &TableId,
    schema: &TableSchema,
    format: SourceFormat,
    rows: EncodedRows,
) -> Result<LoadStatistics, ExportError> {
    let request = LoadRequest {
        table,
        schema,
        format,
        create_disposition: CreateDisposition::CreateNever,
        write_disposition: WriteDisposition::WriteTruncate,
        max_bad_records: 0,
    };
    let job = warehouse.start_load(request, rows).await?;
    tracing::info!(table = %table, job = %job.job_id, "Load job submitted");

    loop {
        let status = warehouse.job_status(&job).await?;
        if let Some(stats) = status.statistics {
            tracing::info!(
                output_rows = stats.output_rows,
                output_bytes = stats.output_bytes,
                "Load job progress"
            );
        }
        if status.state == JobState::Done {
            return match status.error {
                Some(reason) => Err(ExportError::JobFailed {
                    job: job.job_id,
                    reason,
                }),
                None => Ok(status.statistics.unwrap_or_default()),
            };
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures_util::StreamExt;

    use super::*;
    use crate::dest::{JobHandle, JobStatus};
    use crate::types::{FieldDescriptor, TargetType};

    /// Drains the payload on submit, then replays a scripted status sequence.
    struct ScriptedWarehouse {
        statuses: Mutex<Vec<JobStatus>>,
        polls: AtomicUsize,
        submitted: Mutex<Option<(String, &'static str, &'static str)>>,
    }

    impl ScriptedWarehouse {
        fn new(mut statuses: Vec<JobStatus>) -> Self {
            statuses.reverse();
            Self {
                statuses: Mutex::new(statuses),
                polls: AtomicUsize::new(0),
                submitted: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Warehouse for ScriptedWarehouse {
        async fn table_exists(&self, _table: &TableId) -> Result<bool, ExportError> {
            Ok(true)
        }

        async fn create_table(
            &self,
            _table: &TableId,
            _schema: &TableSchema,
            _expiration_days: Option<u32>,
        ) -> Result<(), ExportError> {
            Ok(())
        }

        async fn start_load(
            &self,
            request: LoadRequest<'_>,
            mut rows: EncodedRows,
        ) -> Result<JobHandle, ExportError> {
            while let Some(line) = rows.next().await {
                line?;
            }
            *self.submitted.lock().unwrap() = Some((
                request.table.table.clone(),
                request.create_disposition.as_str(),
                request.write_disposition.as_str(),
            ));
            Ok(JobHandle {
                project: request.table.project.clone(),
                job_id: "job_1".to_string(),
                location: Some("US".to_string()),
            })
        }

        async fn job_status(&self, _job: &JobHandle) -> Result<JobStatus, ExportError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop()
                .expect("poll past terminal state"))
        }
    }

    fn schema() -> TableSchema {
        vec![FieldDescriptor {
            name: "id".to_string(),
            field_type: TargetType::Integer,
            required: true,
        }]
    }

    fn rows(count: usize) -> EncodedRows {
        EncodedRows::from_lines(futures_util::stream::iter(
            (0..count).map(|i| Ok(format!("{{\"id\":{i}}}"))),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_done_and_returns_final_statistics() {
        let warehouse = ScriptedWarehouse::new(vec![
            JobStatus {
                state: JobState::Pending,
                statistics: None,
                error: None,
            },
            JobStatus {
                state: JobState::Running,
                statistics: Some(LoadStatistics {
                    output_rows: 1,
                    output_bytes: 10,
                }),
                error: None,
            },
            JobStatus {
                state: JobState::Done,
                statistics: Some(LoadStatistics {
                    output_rows: 3,
                    output_bytes: 30,
                }),
                error: None,
            },
        ]);
        let table = TableId::new("proj", "ds", "events");

        let stats = run_load(
            &warehouse,
            &table,
            &schema(),
            SourceFormat::NewlineDelimitedJson,
            rows(3),
        )
        .await
        .unwrap();

        assert_eq!(stats.output_rows, 3);
        assert_eq!(stats.output_bytes, 30);
        assert_eq!(warehouse.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_fixes_dispositions() {
        let warehouse = ScriptedWarehouse::new(vec![JobStatus {
            state: JobState::Done,
            statistics: None,
            error: None,
        }]);
        let table = TableId::new("proj", "ds", "events");

        run_load(
            &warehouse,
            &table,
            &schema(),
            SourceFormat::Csv { delimiter: ',' },
            rows(1),
        )
        .await
        .unwrap();

        let submitted = warehouse.submitted.lock().unwrap().clone().unwrap();
        assert_eq!(submitted.0, "events");
        assert_eq!(submitted.1, "CREATE_NEVER");
        assert_eq!(submitted.2, "WRITE_TRUNCATE");
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_surfaces_job_error() {
        let warehouse = ScriptedWarehouse::new(vec![JobStatus {
            state: JobState::Done,
            statistics: None,
            error: Some("backend error".to_string()),
        }]);
        let table = TableId::new("proj", "ds", "events");

        let err = run_load(
            &warehouse,
            &table,
            &schema(),
            SourceFormat::NewlineDelimitedJson,
            rows(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ExportError::JobFailed { ref job, ref reason }
                if job == "job_1" && reason == "backend error"
        ));
    }
}
