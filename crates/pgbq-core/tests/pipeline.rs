//! Pipeline wiring tests against an in-memory warehouse.
//!
//! Mirrors the production control flow (schema -> table lifecycle -> row
//! stream -> load job) with the destination replaced by a recording fake,
//! so the end-to-end contracts hold without external systems.

use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;

use pgbq_core::dest::{JobHandle, JobState, JobStatus, LoadRequest, SourceFormat, Warehouse};
use pgbq_core::error::ExportError;
use pgbq_core::stream::EncodedRows;
use pgbq_core::table;
use pgbq_core::types::{ColumnDescriptor, TableId, TableSchema, TargetType};
use pgbq_core::{job, schema};

#[derive(Default)]
struct FakeState {
    existing_tables: Vec<String>,
    created: Vec<(TableId, TableSchema, Option<u32>)>,
    load: Option<LoadCall>,
    loaded_lines: Vec<String>,
}

#[derive(Clone)]
struct LoadCall {
    table: TableId,
    format: SourceFormat,
    create_disposition: &'static str,
    write_disposition: &'static str,
    max_bad_records: i64,
}

/// In-memory destination: creates are recorded, loads drain the row stream
/// and count lines, and the job reports DONE with matching statistics.
#[derive(Default)]
struct FakeWarehouse {
    state: Mutex<FakeState>,
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn table_exists(&self, table: &TableId) -> Result<bool, ExportError> {
        let state = self.state.lock().unwrap();
        Ok(state.existing_tables.contains(&table.table)
            || state.created.iter().any(|(t, _, _)| t.table == table.table))
    }

    async fn create_table(
        &self,
        table: &TableId,
        schema: &TableSchema,
        expiration_days: Option<u32>,
    ) -> Result<(), ExportError> {
        self.state
            .lock()
            .unwrap()
            .created
            .push((table.clone(), schema.clone(), expiration_days));
        Ok(())
    }

    async fn start_load(
        &self,
        request: LoadRequest<'_>,
        mut rows: EncodedRows,
    ) -> Result<JobHandle, ExportError> {
        let mut lines = Vec::new();
        while let Some(item) = rows.next().await {
            let bytes = item?;
            lines.push(String::from_utf8(bytes.to_vec()).unwrap());
        }

        let mut state = self.state.lock().unwrap();
        state.load = Some(LoadCall {
            table: request.table.clone(),
            format: request.format,
            create_disposition: request.create_disposition.as_str(),
            write_disposition: request.write_disposition.as_str(),
            max_bad_records: request.max_bad_records,
        });
        state.loaded_lines = lines;

        Ok(JobHandle {
            project: request.table.project.clone(),
            job_id: "fake_job".to_string(),
            location: None,
        })
    }

    async fn job_status(&self, _job: &JobHandle) -> Result<JobStatus, ExportError> {
        let state = self.state.lock().unwrap();
        let rows = state.loaded_lines.len() as i64;
        let bytes: i64 = state.loaded_lines.iter().map(|l| l.len() as i64).sum();
        Ok(JobStatus {
            state: JobState::Done,
            statistics: Some(pgbq_core::LoadStatistics {
                output_rows: rows,
                output_bytes: bytes,
            }),
            error: None,
        })
    }
}

fn events_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "int4", false),
        ColumnDescriptor::new("name", "varchar", true),
    ]
}

fn json_rows(count: usize) -> EncodedRows {
    EncodedRows::from_lines(futures_util::stream::iter(
        (0..count).map(|i| Ok(format!("{{\"id\":{i},\"name\":\"n{i}\"}}"))),
    ))
}

#[tokio::test]
async fn export_without_partitioning_truncate_loads_all_rows() {
    let warehouse = FakeWarehouse::default();
    let base = TableId::new("proj", "ds", "events");

    // Schema extraction, as the pipeline does it.
    let (table_schema, retained) = schema::build_schema(&events_columns(), &[], false).unwrap();
    assert_eq!(retained, vec!["id", "name"]);
    assert_eq!(table_schema[0].field_type, TargetType::Integer);
    assert!(table_schema[0].required);
    assert_eq!(table_schema[1].field_type, TargetType::String);
    assert!(!table_schema[1].required);

    let target = table::ensure_table(&warehouse, &base, &table_schema, None)
        .await
        .unwrap();
    assert_eq!(target.table, "events");

    let stats = job::run_load(
        &warehouse,
        &target,
        &table_schema,
        SourceFormat::NewlineDelimitedJson,
        json_rows(5),
    )
    .await
    .unwrap();
    assert_eq!(stats.output_rows, 5);

    let state = warehouse.state.lock().unwrap();
    let load = state.load.clone().unwrap();
    assert_eq!(load.table.table, "events");
    assert_eq!(load.create_disposition, "CREATE_NEVER");
    assert_eq!(load.write_disposition, "WRITE_TRUNCATE");
    assert_eq!(load.max_bad_records, 0);
    assert_eq!(load.format, SourceFormat::NewlineDelimitedJson);
    assert_eq!(state.created.len(), 1);
    assert_eq!(state.loaded_lines.len(), 5);
    assert!(state.loaded_lines[0].ends_with('\n'));
}

#[tokio::test]
async fn partitioned_export_suffixes_target_and_carries_expiration() {
    let warehouse = FakeWarehouse::default();
    let base = TableId::new("proj", "ds", "events");
    let (table_schema, _) = schema::build_schema(&events_columns(), &[], false).unwrap();

    let target = table::ensure_table(&warehouse, &base, &table_schema, Some(30))
        .await
        .unwrap();

    let suffix = table::partition_suffix(chrono::Utc::now().date_naive());
    assert_eq!(target.table, format!("events{suffix}"));

    // Creation happens on the base table, with the retention attached.
    {
        let state = warehouse.state.lock().unwrap();
        assert_eq!(state.created[0].0.table, "events");
        assert_eq!(state.created[0].2, Some(30));
    }

    job::run_load(
        &warehouse,
        &target,
        &table_schema,
        SourceFormat::NewlineDelimitedJson,
        json_rows(1),
    )
    .await
    .unwrap();

    // Every destination operation after resolution uses the same suffixed id.
    let state = warehouse.state.lock().unwrap();
    assert_eq!(state.load.clone().unwrap().table.table, format!("events{suffix}"));
}

#[tokio::test]
async fn strict_unknown_type_aborts_before_any_destination_call() {
    let warehouse = FakeWarehouse::default();
    let mut columns = events_columns();
    columns.push(ColumnDescriptor::new("shape", "geometry", true));

    // Extraction fails, so the pipeline never reaches the warehouse.
    let err = schema::build_schema(&columns, &[], false).unwrap_err();
    assert!(matches!(err, ExportError::UnknownType { .. }));

    let state = warehouse.state.lock().unwrap();
    assert!(state.created.is_empty());
    assert!(state.load.is_none());
}

#[tokio::test]
async fn csv_format_reaches_the_load_request() {
    let warehouse = FakeWarehouse::default();
    let base = TableId::new("proj", "ds", "events");
    let (table_schema, _) = schema::build_schema(&events_columns(), &[], false).unwrap();
    let target = table::ensure_table(&warehouse, &base, &table_schema, None)
        .await
        .unwrap();

    let lines = EncodedRows::from_lines(futures_util::stream::iter(vec![
        Ok("1|one".to_string()),
        Ok("2|".to_string()),
    ]));
    job::run_load(
        &warehouse,
        &target,
        &table_schema,
        SourceFormat::Csv { delimiter: '|' },
        lines,
    )
    .await
    .unwrap();

    let state = warehouse.state.lock().unwrap();
    assert_eq!(
        state.load.clone().unwrap().format,
        SourceFormat::Csv { delimiter: '|' }
    );
    assert_eq!(state.loaded_lines, vec!["1|one\n", "2|\n"]);
}

#[tokio::test]
async fn row_stream_error_fails_the_load() {
    let warehouse = FakeWarehouse::default();
    let base = TableId::new("proj", "ds", "events");
    let (table_schema, _) = schema::build_schema(&events_columns(), &[], false).unwrap();
    let target = table::ensure_table(&warehouse, &base, &table_schema, None)
        .await
        .unwrap();

    let lines = EncodedRows::from_lines(futures_util::stream::iter(vec![
        Ok("{\"id\":1}".to_string()),
        Err(ExportError::Config("scan blew up".to_string())),
    ]));
    let err = job::run_load(
        &warehouse,
        &target,
        &table_schema,
        SourceFormat::NewlineDelimitedJson,
        lines,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("scan blew up"));
}
