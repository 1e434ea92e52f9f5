//! Entity sinks. The only concrete sink writes entities back out as
//! newline-delimited JSON, one entity per line, in stream order.

use crate::model::Entity;
use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub trait EntitySink {
    fn add_entity(&mut self, entity: &Entity) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

pub struct JsonlSink {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl JsonlSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
        })
    }

    pub fn stdout() -> Self {
        Self {
            writer: BufWriter::new(Box::new(std::io::stdout())),
        }
    }
}

impl EntitySink for JsonlSink {
    fn add_entity(&mut self, entity: &Entity) -> Result<()> {
        serde_json::to_writer(&mut self.writer, entity)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Tag};

    #[test]
    fn writes_one_entity_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut sink = JsonlSink::new(&path).unwrap();
        sink.add_entity(&Entity::Node(Node {
            id: 1,
            tags: vec![Tag::new("name", "a")],
            lon: Some(1.0),
            lat: Some(2.0),
        }))
        .unwrap();
        sink.add_entity(&Entity::Node(Node {
            id: 2,
            tags: Vec::new(),
            lon: None,
            lat: None,
        }))
        .unwrap();
        sink.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"type\":\"node\""));
        let back: Entity = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(back.id(), 2);
    }
}
