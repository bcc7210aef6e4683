//! Records produced by the decoder and the sinks that receive them.

use crossbeam_channel::Sender;
use log::debug;

use crate::{cursor::SamplePosition, error::DecodeError, lines::LineVector};

/// A field packed into an integer, with its width in bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Packed {
    pub value: u64,
    pub bits: u32,
}

/// Structured output for later protocol layers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// One bus cycle. `raw` is the full set of line states at the strobe
    /// assertion; the packed fields are what downstream layers expect.
    Item {
        raw: LineVector,
        address: Packed,
        data: Packed,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Item { .. } => "ITEM",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AnnotationClass {
    Item,
    Warn,
}

impl AnnotationClass {
    pub fn id(self) -> &'static str {
        match self {
            AnnotationClass::Item => "item",
            AnnotationClass::Warn => "warn",
        }
    }

    /// The id of the row this class is displayed in.
    pub fn row(self) -> &'static str {
        match self {
            AnnotationClass::Item => "items",
            AnnotationClass::Warn => "warns",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordBody {
    Event(Event),
    Annotation {
        class: AnnotationClass,
        text: String,
    },
}

/// Something the decoder emitted, spanning the samples `ss..es`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub ss: SamplePosition,
    pub es: SamplePosition,
    pub body: RecordBody,
}

impl Record {
    pub fn annotation(&self) -> Option<(AnnotationClass, &str)> {
        match &self.body {
            RecordBody::Annotation { class, text } => Some((*class, text.as_str())),
            RecordBody::Event(_) => None,
        }
    }

    pub fn event(&self) -> Option<&Event> {
        match &self.body {
            RecordBody::Event(event) => Some(event),
            RecordBody::Annotation { .. } => None,
        }
    }
}

/// Where decoded records go.
pub trait Sink {
    /// Fails with `DecodeError::SinkClosed` once nobody is listening, which
    /// stops the decoder.
    fn put(&mut self, record: Record) -> Result<(), DecodeError>;
}

impl Sink for Vec<Record> {
    fn put(&mut self, record: Record) -> Result<(), DecodeError> {
        self.push(record);
        Ok(())
    }
}

impl Sink for Sender<Record> {
    fn put(&mut self, record: Record) -> Result<(), DecodeError> {
        self.send(record).map_err(|_| {
            debug!("Record receiver disconnected");
            DecodeError::SinkClosed
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn annotation(text: &str) -> Record {
        Record {
            ss: SamplePosition(1),
            es: SamplePosition(2),
            body: RecordBody::Annotation {
                class: AnnotationClass::Item,
                text: text.to_owned(),
            },
        }
    }

    #[test]
    fn test_channel_sink() {
        let (mut tx, rx) = crossbeam_channel::unbounded();
        tx.put(annotation("R 01 : 03")).unwrap();
        drop(tx);
        let received: Vec<Record> = rx.iter().collect();
        assert_eq!(received, vec![annotation("R 01 : 03")]);
        assert_eq!(
            received[0].annotation(),
            Some((AnnotationClass::Item, "R 01 : 03"))
        );
        assert_eq!(received[0].event(), None);
    }

    #[test]
    fn test_disconnected_channel_sink() {
        let (mut tx, rx) = crossbeam_channel::unbounded::<Record>();
        drop(rx);
        assert_eq!(tx.put(annotation("W 00 : 00")), Err(DecodeError::SinkClosed));
    }

    #[test]
    fn test_rows() {
        assert_eq!(AnnotationClass::Item.row(), "items");
        assert_eq!(AnnotationClass::Warn.row(), "warns");
        assert_eq!(AnnotationClass::Warn.id(), "warn");
    }
}
