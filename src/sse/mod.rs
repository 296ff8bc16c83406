//! Server-Sent-Events framing for the run stream.

use std::io;

use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use strum::IntoStaticStr;

/// Frame one named event.
///
/// Produces `event: <name>\ndata: <json>\n\n`. A `None` payload yields an
/// empty data line. JSON is written in field order with `", "` between items
/// and `": "` after keys, matching what the SDK client was built against.
pub fn frame(event: &str, payload: Option<&Value>) -> Result<Bytes, serde_json::Error> {
    let data = match payload {
        Some(value) => to_spaced_json(value)?,
        None => String::new(),
    };
    Ok(Bytes::from(format!("event: {event}\ndata: {data}\n\n")))
}

fn to_spaced_json(value: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Events emitted on a run stream, in the order the client expects:
/// one `metadata`, any number of `messages`, then `end` (or `error`).
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StreamEvent {
    Metadata { run_id: String },
    Messages { chunk: Value, tags: Vec<String> },
    Error { error: String, message: String },
    End,
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn payload(&self) -> Option<Value> {
        match self {
            Self::Metadata { run_id } => Some(json!({ "run_id": run_id })),
            Self::Messages { chunk, tags } => Some(json!([chunk, { "tags": tags }])),
            Self::Error { error, message } => Some(json!({ "error": error, "message": message })),
            Self::End => None,
        }
    }

    pub fn to_frame(&self) -> Result<Bytes, serde_json::Error> {
        frame(self.name(), self.payload().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_frame_has_empty_data_line() {
        assert_eq!(frame("end", None).unwrap(), Bytes::from("event: end\ndata: \n\n"));
    }

    #[test]
    fn nested_values_use_spaced_separators() {
        let bytes = frame("messages", Some(&json!([{"a": 1, "b": [1, 2]}, {"tags": []}]))).unwrap();
        assert_eq!(
            bytes,
            Bytes::from("event: messages\ndata: [{\"a\": 1, \"b\": [1, 2]}, {\"tags\": []}]\n\n")
        );
    }

    #[test]
    fn event_names_are_snake_case() {
        assert_eq!(StreamEvent::End.name(), "end");
        assert_eq!(
            StreamEvent::Metadata { run_id: "r".into() }.name(),
            "metadata"
        );
    }
}
