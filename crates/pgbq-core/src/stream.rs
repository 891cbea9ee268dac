//! Streaming row encoder.
//!
//! The source does the per-row encoding (`row_to_json` or a delimiter join),
//! so each result row is already one line of load payload. A producer task
//! pulls rows off the wire and hands encoded lines through a bounded
//! single-producer/single-consumer channel; the consumer drains it while the
//! producer runs. If the consumer stalls, the producer blocks on `send`
//! instead of buffering, and dropping the consumer closes the channel, which
//! stops the producer and releases the row stream (and with it the portal).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_postgres::Client;

use crate::config::{Encoding, ExportConfig};
use crate::error::ExportError;
use crate::source::quote_identifier;

/// Bounded handoff depth: one line buffered, the next blocks the producer.
const LINE_CHANNEL_CAPACITY: usize = 1;

/// Build the row-producing query over the retained columns.
///
/// JSON mode wraps the projection in `row_to_json`; delimited mode joins the
/// columns as text with the configured delimiter, keeping NULLs positional
/// as empty strings. Either way the query yields a single text column, one
/// line per row.
#[must_use]
pub fn build_row_query(config: &ExportConfig, columns: &[String]) -> String {
    let table = format!(
        "{}.{}",
        quote_identifier(&config.source_schema),
        quote_identifier(&config.source_table)
    );
    match config.encoding {
        Encoding::Json => {
            let cols = columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ");
            format!("SELECT row_to_json(t)::text FROM (SELECT {cols} FROM {table}) AS t")
        }
        Encoding::Delimited => {
            let cols = columns
                .iter()
                .map(|c| format!("coalesce({}::text, '')", quote_identifier(c)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "SELECT concat_ws({}, {cols}) FROM {table}",
                quote_literal(config.delimiter)
            )
        }
    }
}

fn quote_literal(delimiter: char) -> String {
    if delimiter == '\'' {
        "''''".to_string()
    } else {
        format!("'{delimiter}'")
    }
}

/// Consumer side of the encoded row pipe.
///
/// Yields one newline-terminated line per source row, then the terminal
/// error if the scan failed. Dropping it cancels the producer.
pub struct EncodedRows {
    rx: mpsc::Receiver<Result<Bytes, ExportError>>,
}

impl EncodedRows {
    /// Pump an already-produced line sequence through the bounded pipe.
    ///
    /// The streaming seam between encoding and upload: `spawn_row_stream`
    /// is the query-backed variant of this.
    pub fn from_lines<S>(lines: S) -> Self
    where
        S: Stream<Item = Result<String, ExportError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        tokio::spawn(pump_lines(lines, tx));
        Self { rx }
    }

    /// Receive the next encoded line.
    pub async fn recv(&mut self) -> Option<Result<Bytes, ExportError>> {
        self.rx.recv().await
    }
}

impl Stream for EncodedRows {
    type Item = Result<Bytes, ExportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Issue the row query and stream its encoded lines.
///
/// Takes the client by value: the row query owns the connection until the
/// stream ends, and the connection is closed when the producer finishes.
/// Query and scan failures arrive in-band as the stream's terminal item.
pub fn spawn_row_stream(client: Client, query: String) -> EncodedRows {
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let rows = match client.query_raw(query.as_str(), Vec::<String>::new()).await {
            Ok(rows) => rows,
            Err(e) => {
                let _ = tx.send(Err(ExportError::RowQuery(e))).await;
                return;
            }
        };
        futures_util::pin_mut!(rows);

        let lines = rows.map(|item| match item {
            Ok(row) => row.try_get::<_, String>(0).map_err(ExportError::RowScan),
            Err(e) => Err(ExportError::RowScan(e)),
        });
        pump_lines(lines, tx).await;
        // `rows` drops here, releasing the portal before the client goes.
    });

    EncodedRows { rx }
}

/// Move lines from `lines` into the bounded channel, one at a time.
///
/// Stops on the first scan error (forwarded as the terminal item) or when
/// the receiver is dropped.
async fn pump_lines<S>(lines: S, tx: mpsc::Sender<Result<Bytes, ExportError>>)
where
    S: Stream<Item = Result<String, ExportError>>,
{
    futures_util::pin_mut!(lines);
    while let Some(item) = lines.next().await {
        match item {
            Ok(mut line) => {
                line.push('\n');
                if tx.send(Ok(Bytes::from(line.into_bytes()))).await.is_err() {
                    // Consumer is gone; stop producing.
                    return;
                }
            }
            Err(e) => {
                tracing::error!("row stream aborted: {e}");
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }
}
