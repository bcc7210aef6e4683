//! The bus transaction state machine.
//!
//! Each cycle starts when either strobe is asserted and ends when that strobe
//! is released:
//!
//! ```text
//!        Idle ──RS asserted──▶ CapturingRead  ──RS released──▶ Idle
//!          └───WS asserted──▶ CapturingWrite ──WS released──▶ Idle
//! ```
//!
//! For a read the address is sampled at the assertion and the data at the
//! release, when the device has driven it. For a write both are sampled at
//! the assertion.

use std::{convert::Infallible, fmt, str::FromStr};

use anyhow::bail;
use log::{debug, warn};

use crate::{
    bitpack::bitpack,
    cursor::{Condition, Requirement, SamplePosition, SignalCursor},
    error::DecodeError,
    lines::{ChannelId, LineVector, NUM_ADDRESS_LINES, NUM_DATA_LINES, READ_STROBE, WRITE_STROBE},
    output::{AnnotationClass, Event, Packed, Record, RecordBody, Sink},
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StrobePolarity {
    #[default]
    ActiveLow,
    ActiveHigh,
}

impl StrobePolarity {
    pub const VALUES: [&'static str; 2] = ["active_low", "active_high"];

    pub fn as_str(self) -> &'static str {
        match self {
            StrobePolarity::ActiveLow => "active_low",
            StrobePolarity::ActiveHigh => "active_high",
        }
    }

    pub fn assertion(self) -> Requirement {
        match self {
            StrobePolarity::ActiveLow => Requirement::Falling,
            StrobePolarity::ActiveHigh => Requirement::Rising,
        }
    }

    pub fn release(self) -> Requirement {
        match self {
            StrobePolarity::ActiveLow => Requirement::Rising,
            StrobePolarity::ActiveHigh => Requirement::Falling,
        }
    }

    pub fn is_asserted(self, level: bool) -> bool {
        match self {
            StrobePolarity::ActiveLow => !level,
            StrobePolarity::ActiveHigh => level,
        }
    }
}

impl fmt::Display for StrobePolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrobePolarity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "active_low" => StrobePolarity::ActiveLow,
            "active_high" => StrobePolarity::ActiveHigh,
            _ => bail!(
                "Invalid strobe polarity {s:?}; expected one of {:?}",
                Self::VALUES
            ),
        })
    }
}

/// Decoder options.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Which level of the strobes means "asserted".
    pub strobe_polarity: StrobePolarity,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub fn letter(self) -> char {
        match self {
            Direction::Read => 'R',
            Direction::Write => 'W',
        }
    }

    fn strobe(self) -> ChannelId {
        match self {
            Direction::Read => READ_STROBE,
            Direction::Write => WRITE_STROBE,
        }
    }
}

/// One decoded bus cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Sample of the strobe assertion.
    pub start: SamplePosition,
    /// Sample of the strobe release.
    pub end: SamplePosition,
    pub direction: Direction,
    /// 6 bits.
    pub address: u8,
    /// 8 bits.
    pub data: u8,
    /// Line states at the strobe assertion.
    pub raw_lines: LineVector,
    /// Both strobes were asserted at once. The read strobe wins.
    pub contended: bool,
}

impl Transaction {
    /// E.g. `R 01 : 03`.
    pub fn annotation_text(&self) -> String {
        format!(
            "{} {:02x} : {:02x}",
            self.direction.letter(),
            self.address,
            self.data
        )
    }

    /// The records describing this transaction, in the order they are
    /// emitted.
    pub fn records(&self) -> Vec<Record> {
        let span = |body| Record {
            ss: self.start,
            es: self.end,
            body,
        };
        let mut records = vec![
            span(RecordBody::Event(Event::Item {
                raw: self.raw_lines,
                address: Packed {
                    value: self.address as u64,
                    bits: NUM_ADDRESS_LINES as u32,
                },
                data: Packed {
                    value: self.data as u64,
                    bits: NUM_DATA_LINES as u32,
                },
            })),
            span(RecordBody::Annotation {
                class: AnnotationClass::Item,
                text: self.annotation_text(),
            }),
        ];
        if self.contended {
            records.push(span(RecordBody::Annotation {
                class: AnnotationClass::Warn,
                text: "Both strobes asserted".to_owned(),
            }));
        }
        records
    }
}

/// Turns strobe edges from a `SignalCursor` into `Transaction`s.
#[derive(Debug)]
pub struct Decoder<C> {
    cursor: C,
    options: Options,
    /// Start of the current (or last) item.
    ss_item: Option<SamplePosition>,
    /// End of the last item.
    es_item: Option<SamplePosition>,
}

impl<C> Decoder<C>
where
    C: SignalCursor,
{
    pub fn new(cursor: C, options: Options) -> Self {
        Self {
            cursor,
            options,
            ss_item: None,
            es_item: None,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Forget any item in progress.
    pub fn reset(&mut self) {
        self.ss_item = None;
        self.es_item = None;
    }

    /// Start again with a new cursor, normally one at the start of a
    /// capture.
    pub fn restart(&mut self, cursor: C) {
        self.cursor = cursor;
        self.reset();
    }

    pub fn into_cursor(self) -> C {
        self.cursor
    }

    /// The start and end markers of the current item. If the start is later
    /// than the end (or there is no end) an item is in progress.
    pub fn pending_span(&self) -> (Option<SamplePosition>, Option<SamplePosition>) {
        (self.ss_item, self.es_item)
    }

    /// Wait for the next complete bus cycle. Nothing is returned for a cycle
    /// that is still in progress when the capture ends.
    pub fn next_transaction(&mut self) -> Result<Transaction, DecodeError> {
        let polarity = self.options.strobe_polarity;
        let assertion = Condition::new()
            .with(READ_STROBE, polarity.assertion())
            .with(WRITE_STROBE, polarity.assertion());

        loop {
            let asserted = self.cursor.advance_until(&assertion)?;
            let start = self.cursor.position();
            self.ss_item = Some(start);

            let read = polarity.is_asserted(asserted.read_strobe());
            let write = polarity.is_asserted(asserted.write_strobe());

            let direction = match (read, write) {
                (true, _) => Direction::Read,
                (false, true) => Direction::Write,
                (false, false) => {
                    // Can't happen with an edge condition, but a cursor might
                    // hand back something odd.
                    debug!("No strobe asserted at sample {start}");
                    continue;
                }
            };
            if read && write {
                warn!("Both strobes asserted at sample {start}; decoding as a read");
            }

            let released = self
                .cursor
                .advance_until(&Condition::new().with(direction.strobe(), polarity.release()))?;
            let end = self.cursor.position();
            self.es_item = Some(end);

            let data_lines = match direction {
                Direction::Read => released.data_bits(),
                Direction::Write => asserted.data_bits(),
            };

            let transaction = Transaction {
                start,
                end,
                direction,
                address: bitpack(asserted.address_bits()) as u8,
                data: bitpack(data_lines) as u8,
                raw_lines: asserted,
                contended: read && write,
            };
            debug!("{start}-{end}: {}", transaction.annotation_text());
            return Ok(transaction);
        }
    }

    /// Decode one bus cycle and send its records to `sink`.
    pub fn step(&mut self, sink: &mut impl Sink) -> Result<Transaction, DecodeError> {
        let transaction = self.next_transaction()?;
        for record in transaction.records() {
            sink.put(record)?;
        }
        Ok(transaction)
    }

    /// Decode until the cursor fails. Running out of capture is reported as
    /// `DecodeError::EndOfStream` like any other failure.
    pub fn run(&mut self, sink: &mut impl Sink) -> Result<Infallible, DecodeError> {
        loop {
            self.step(sink)?;
        }
    }

    /// Decode the rest of the capture, returning the number of transactions.
    /// The end of the capture is not an error here. A closed sink is.
    pub fn decode_all(&mut self, sink: &mut impl Sink) -> Result<usize, DecodeError> {
        let mut count = 0;
        loop {
            match self.step(sink) {
                Ok(_) => count += 1,
                Err(DecodeError::EndOfStream) => return Ok(count),
                Err(e) => return Err(e),
            }
        }
    }

    /// The remaining transactions, lazily. Ends at the end of the capture.
    pub fn transactions(&mut self) -> Transactions<'_, C> {
        Transactions {
            decoder: self,
            done: false,
        }
    }
}

pub struct Transactions<'d, C> {
    decoder: &'d mut Decoder<C>,
    done: bool,
}

impl<C> Iterator for Transactions<'_, C>
where
    C: SignalCursor,
{
    type Item = Result<Transaction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.next_transaction() {
            Ok(transaction) => Some(Ok(transaction)),
            Err(DecodeError::EndOfStream) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<C> std::iter::FusedIterator for Transactions<'_, C> where C: SignalCursor {}
