use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSONL sink for conversion diagnostics. One JSON object per line.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: BTreeMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: BTreeMap::new(),
            })),
        })
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    /// Writes `{"type":kind, field:value...}`. Values are emitted as JSON strings.
    pub fn log_event(&self, kind: &str, fields: &[(&str, &str)]) {
        let mut json = format!("{{\"type\":{}", json_string(kind));
        for (key, value) in fields {
            json.push_str(&format!(",{}:{}", json_string(key), json_string(value)));
        }
        json.push('}');
        self.log_json(&json);
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let counters = std::mem::take(&mut state.counters);
            let mut counts_json = String::from("{");
            for (idx, (key, value)) in counters.iter().enumerate() {
                if idx > 0 {
                    counts_json.push(',');
                }
                counts_json.push_str(&format!("{}:{}", json_string(key), value));
            }
            counts_json.push('}');
            let json = format!(
                "{{\"type\":\"debug.summary\",\"context\":{},\"counts\":{}}}",
                json_string(context),
                counts_json
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_string(raw: &str) -> String {
    format!("\"{}\"", json_escape(raw))
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_log_path(tag: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("tablexl_debug_{tag}_{nanos}.jsonl"))
    }

    #[test]
    fn escape_handles_quotes_and_control_chars() {
        assert_eq!(json_escape("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
        assert_eq!(json_escape("\u{1}"), "\\u0001");
    }

    #[test]
    fn events_and_summary_are_written_as_jsonl() {
        let path = temp_log_path("events");
        let logger = DebugLogger::new(&path).expect("create debug log");
        logger.log_event("table.built", &[("name", "t"), ("rows", "2")]);
        logger.increment("style.cache_miss", 1);
        logger.increment("style.cache_miss", 2);
        logger.emit_summary("document");
        logger.flush();

        let text = std::fs::read_to_string(&path).expect("read debug log");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2, "unexpected log: {text}");
        assert_eq!(
            lines[0],
            "{\"type\":\"table.built\",\"name\":\"t\",\"rows\":\"2\"}"
        );
        assert!(
            lines[1].contains("\"style.cache_miss\":3"),
            "summary missing counter: {}",
            lines[1]
        );
        let _ = std::fs::remove_file(&path);
    }
}
