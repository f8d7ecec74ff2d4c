//! Incremental server-sent-events decoder.
//!
//! Completion-style endpoints stream `data:` lines separated by blank
//! lines. Fragments arrive at arbitrary byte boundaries, so the decoder
//! buffers the incomplete trailing line (even a split UTF-8 code point)
//! until the rest arrives, and only emits records once the blank-line
//! terminator has been seen.

/// One complete server-sent event record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SseEvent {
    /// Event type; `"message"` when the stream does not set one.
    pub event: String,
    /// Data payload; multiple `data:` lines in one record join with `\n`.
    pub data: String,
    /// Optional event id.
    pub id: Option<String>,
}

/// Stateful decoder fed with raw body fragments.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fragment and returns every record it completes, in
    /// stream order.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(fragment);

        let mut records = Vec::new();
        while let Some(newline) = self.buf.iter().position(|&byte| byte == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');

            if line.is_empty() {
                if let Some(record) = self.take_record() {
                    records.push(record);
                }
            } else {
                self.apply_field(line);
            }
        }
        records
    }

    fn apply_field(&mut self, line: &str) {
        // A leading colon marks a comment/keep-alive line.
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
    }

    fn take_record(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            // Blank line without accumulated data dispatches nothing.
            self.event = None;
            self.id = None;
            return None;
        }

        Some(SseEvent {
            event: self.event.take().unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.take(),
        })
    }
}
