//! Record sinks
//!
//! Retrieval operations hand back normalized records; a sink decides where
//! they go. Database persistence lives outside this crate.

use serde::Serialize;
use serde_json::Value;
use std::io::Write;

use crate::error::{HarvestError, HarvestResult};

/// Accepts normalized records one at a time
pub trait RecordSink {
    fn write_record(&mut self, record: &Value) -> HarvestResult<()>;

    fn flush(&mut self) -> HarvestResult<()> {
        Ok(())
    }
}

/// Serialize each item and write it to `sink`, returning how many were written
pub fn emit<S, T>(sink: &mut S, records: &[T]) -> HarvestResult<usize>
where
    S: RecordSink + ?Sized,
    T: Serialize,
{
    for record in records {
        let value = serde_json::to_value(record)
            .map_err(|e| HarvestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        sink.write_record(&value)?;
    }
    sink.flush()?;
    Ok(records.len())
}

/// One JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write_record(&mut self, record: &Value) -> HarvestResult<()> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| HarvestError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> HarvestResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_lines_output() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let written = emit(&mut sink, &[json!({"a": 1}), json!({"b": "two"})]).unwrap();

        assert_eq!(written, 2);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "{\"a\":1}\n{\"b\":\"two\"}\n");
    }

    #[test]
    fn test_emit_serializes_structs() {
        #[derive(Serialize)]
        struct Row {
            org: &'static str,
        }

        let mut sink = JsonLinesSink::new(Vec::new());
        emit(&mut sink, &[Row { org: "NA" }]).unwrap();

        assert_eq!(sink.into_inner(), b"{\"org\":\"NA\"}\n");
    }
}
