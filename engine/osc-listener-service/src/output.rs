//! Batch subscriber that writes each record as one line

use std::io::Write;
use std::sync::Arc;

use event_batcher::{Batch, EventRecord, EventSink};
use parking_lot::Mutex;
use serde_json::json;
use tracing::warn;

use crate::config::OutputFormat;

/// Writes every record of every batch to `writer`, one line per key
pub struct LineSink<W> {
    writer: Mutex<W>,
    format: OutputFormat,
}

impl LineSink<std::io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer: Mutex::new(writer), format }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Render one record in the given format
pub fn format_record(batch: &Batch, record: &EventRecord, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut line = record.key.clone();
            for arg in &record.arguments {
                line.push(' ');
                line.push_str(&arg.to_string());
            }
            line
        }
        OutputFormat::Json => json!({
            "sequence": batch.sequence,
            "emitted_at": batch.emitted_at.to_rfc3339(),
            "key": record.key,
            "arguments": record.arguments,
        })
        .to_string(),
    }
}

impl<W: Write + Send> EventSink for LineSink<W> {
    fn deliver(&self, batch: &Arc<Batch>) {
        let mut writer = self.writer.lock();
        for record in &batch.records {
            if let Err(e) = writeln!(writer, "{}", format_record(batch, record, self.format)) {
                warn!("Failed to write batch {}: {}", batch.sequence, e);
                return;
            }
        }
        if let Err(e) = writer.flush() {
            warn!("Failed to flush batch {}: {}", batch.sequence, e);
        }
    }
}
