use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::debug::json_escape;

#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    span_totals: BTreeMap<String, (f64, u64)>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                span_totals: BTreeMap::new(),
            })),
        })
    }

    pub fn log_span_ms(&self, name: &str, table_index: Option<usize>, ms: f64) {
        let table = table_index
            .map(|v| v.to_string())
            .unwrap_or_else(|| "null".to_string());
        let json = format!(
            "{{\"type\":\"perf.span\",\"name\":\"{}\",\"table\":{},\"unit\":\"ms\",\"ms\":{:.3}}}",
            json_escape(name),
            table,
            ms
        );
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.span_totals.entry(name.to_string()).or_insert((0.0, 0));
            entry.0 += ms;
            entry.1 = entry.1.saturating_add(1);
            let _ = writeln!(state.writer, "{json}");
        }
    }

    /// Runs `f` and records its wall time under `name`.
    pub fn time<T>(&self, name: &str, table_index: Option<usize>, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.log_span_ms(name, table_index, start.elapsed().as_secs_f64() * 1000.0);
        out
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        for (name, (ms, count)) in &self.span_totals {
            let avg = if *count == 0 { 0.0 } else { ms / *count as f64 };
            let _ = writeln!(
                self.writer,
                "{{\"type\":\"perf.total\",\"name\":\"{}\",\"unit\":\"ms\",\"ms\":{:.3},\"count\":{},\"avg_ms\":{:.3}}}",
                json_escape(name),
                ms,
                count,
                avg
            );
        }
        let _ = self.writer.flush();
    }
}

/// Times `f` when a perf logger is configured, otherwise just runs it.
pub(crate) fn timed<T>(
    perf: Option<&PerfLogger>,
    name: &str,
    table_index: Option<usize>,
    f: impl FnOnce() -> T,
) -> T {
    match perf {
        Some(logger) => logger.time(name, table_index, f),
        None => f(),
    }
}
