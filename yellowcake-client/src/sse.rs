use serde_json::Value;

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Chunks may split lines (or UTF-8 sequences) anywhere; bytes are held
/// until a full line is available.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes an event left unterminated when the stream closed.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// What a Yellowcake event means to a consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Progress(Value),
    Chunk(String),
    Complete(Value),
    Error(Value),
    Done,
    Other(Value),
}

impl StreamMessage {
    pub fn classify(event: &SseEvent) -> Self {
        let data = event.data.trim();
        if data == "[DONE]" {
            return StreamMessage::Done;
        }

        let value =
            serde_json::from_str::<Value>(data).unwrap_or_else(|_| Value::String(data.to_string()));

        match event.event.as_deref() {
            Some("progress") | Some("status") => StreamMessage::Progress(value),
            Some("chunk") => StreamMessage::Chunk(value_text(value)),
            Some("complete") => StreamMessage::Complete(value),
            Some("error") => StreamMessage::Error(value),
            _ => Self::classify_shape(value),
        }
    }

    fn classify_shape(value: Value) -> Self {
        match &value {
            Value::String(token) => StreamMessage::Chunk(token.clone()),
            Value::Object(map) if map.contains_key("stage") => StreamMessage::Progress(value),
            Value::Object(map) if map.get("data").is_some_and(Value::is_array) => {
                StreamMessage::Complete(value)
            }
            Value::Object(map) if map.contains_key("error") => StreamMessage::Error(value),
            _ => StreamMessage::Other(value),
        }
    }

    /// Stage name of a progress update.
    pub fn stage(&self) -> Option<&str> {
        match self {
            StreamMessage::Progress(value) => value.get("stage").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Extracted items of the final payload.
    pub fn items(&self) -> Option<&Vec<Value>> {
        match self {
            StreamMessage::Complete(value) => value.get("data").and_then(Value::as_array),
            _ => None,
        }
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Encodes an error as an SSE frame clients already listen for.
pub fn error_frame(payload: &Value) -> String {
    format!("event: error\ndata: {}\n\n", payload)
}
