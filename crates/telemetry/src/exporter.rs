// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The snapshot exporter contract and built-in exporters.
//!
//! Exporters receive every periodic snapshot and the final one. An exporter
//! failure is logged by the runner and never aborts the run.

use crate::error::Error;
use crate::snapshot::{RunContext, Snapshot, percentile};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Receives aggregated snapshots during and at the end of a run.
pub trait SnapshotExporter: Send + Sync {
    /// A short static name used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Exports one snapshot. `title` distinguishes periodic reports from
    /// the final one.
    fn export(&self, title: &str, snapshot: &Snapshot, ctx: &RunContext) -> Result<(), Error>;

    /// Releases exporter resources after the final export. Idempotent.
    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Emits a condensed summary of each snapshot as a structured log event.
#[derive(Debug, Default)]
pub struct LogExporter;

impl SnapshotExporter for LogExporter {
    fn name(&self) -> &'static str {
        "log"
    }

    fn export(&self, title: &str, snapshot: &Snapshot, ctx: &RunContext) -> Result<(), Error> {
        let p50 = percentile(&snapshot.success_percentiles, 0.5)
            .map(|entry| entry.value_or_nan() / 1_000_000.0);
        let p99 = percentile(&snapshot.success_percentiles, 0.99)
            .map(|entry| entry.value_or_nan() / 1_000_000.0);
        tracing::info!(
            run_id = %ctx.run_id,
            title,
            elapsed_ms = snapshot.elapsed_ms,
            total = snapshot.total,
            success = snapshot.success,
            failure = snapshot.failure,
            dropped = snapshot.dropped,
            rejected = snapshot.rejected,
            queue_depth = snapshot.queue_depth,
            success_p50_ms = p50,
            success_p99_ms = p99,
            "report"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    title: &'a str,
    context: &'a RunContext,
    snapshot: &'a Snapshot,
}

/// Appends one JSON document per export to a file.
pub struct JsonLinesExporter {
    writer: Mutex<Option<std::io::BufWriter<std::fs::File>>>,
}

impl JsonLinesExporter {
    /// Creates (or truncates) the report file at `path`.
    pub fn create(path: &Path) -> Result<Self, Error> {
        let file = std::fs::File::create(path).map_err(|e| Error::ExporterError {
            exporter: "json-lines",
            details: format!("cannot create `{}`: {e}", path.display()),
        })?;
        Ok(Self { writer: Mutex::new(Some(std::io::BufWriter::new(file))) })
    }

    fn io_error(details: String) -> Error {
        Error::ExporterError { exporter: "json-lines", details }
    }
}

impl SnapshotExporter for JsonLinesExporter {
    fn name(&self) -> &'static str {
        "json-lines"
    }

    fn export(&self, title: &str, snapshot: &Snapshot, ctx: &RunContext) -> Result<(), Error> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or_else(|| Self::io_error("already closed".to_owned()))?;
        let line = JsonLine { title, context: ctx, snapshot };
        serde_json::to_writer(&mut *writer, &line)
            .map_err(|e| Self::io_error(e.to_string()))?;
        writer.write_all(b"\n").map_err(|e| Self::io_error(e.to_string()))?;
        writer.flush().map_err(|e| Self::io_error(e.to_string()))
    }

    fn close(&self) -> Result<(), Error> {
        if let Some(mut writer) = self.writer.lock().take() {
            writer.flush().map_err(|e| Self::io_error(e.to_string()))?;
        }
        Ok(())
    }
}
