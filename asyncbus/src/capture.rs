//! In-memory captures and the cursor that walks them.

use anyhow::{bail, Result};
use log::debug;

use crate::{
    cursor::{Condition, SamplePosition, SignalCursor},
    error::DecodeError,
    lines::LineVector,
};

/// A finished capture of the bus. Only the samples where the line states
/// change are stored; the state holds until the next change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capture {
    /// Samples per second, if known.
    pub samplerate: Option<u64>,
    num_samples: u64,
    /// Sorted by sample, strictly increasing, and the first is at sample 0.
    changes: Vec<(SamplePosition, LineVector)>,
}

impl Capture {
    pub fn new(
        samplerate: Option<u64>,
        num_samples: u64,
        changes: Vec<(SamplePosition, LineVector)>,
    ) -> Result<Self> {
        match changes.first() {
            Some((first, _)) if first.0 != 0 => {
                bail!("First value change must be at sample 0, not {first}");
            }
            None if num_samples > 0 => {
                bail!("Capture of {num_samples} samples has no initial line state");
            }
            _ => {}
        }

        if let Some(w) = changes.windows(2).find(|w| w[1].0 <= w[0].0) {
            bail!(
                "Value change at sample {} follows one at sample {}",
                w[1].0,
                w[0].0
            );
        }

        if let Some((last, _)) = changes.last() {
            if last.0 >= num_samples {
                bail!(
                    "Value change at sample {last} is beyond the end of the capture ({num_samples} samples)"
                );
            }
        }

        Ok(Self {
            samplerate: samplerate.filter(|&rate| rate != 0),
            num_samples,
            changes,
        })
    }

    /// Build from one line vector per sample.
    pub fn from_samples(
        samplerate: Option<u64>,
        samples: impl IntoIterator<Item = LineVector>,
    ) -> Self {
        let mut changes: Vec<(SamplePosition, LineVector)> = Vec::new();
        let mut num_samples = 0;
        for lines in samples {
            if changes.last().map_or(true, |(_, prev)| *prev != lines) {
                changes.push((SamplePosition(num_samples), lines));
            }
            num_samples += 1;
        }
        Self {
            samplerate: samplerate.filter(|&rate| rate != 0),
            num_samples,
            changes,
        }
    }

    /// Like `from_samples` but each sample is a slice with one entry per
    /// channel.
    pub fn from_line_samples<'a>(
        samplerate: Option<u64>,
        samples: impl IntoIterator<Item = &'a [bool]>,
    ) -> Result<Self, DecodeError> {
        let samples = samples
            .into_iter()
            .map(LineVector::from_lines)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_samples(samplerate, samples))
    }

    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    pub fn changes(&self) -> &[(SamplePosition, LineVector)] {
        &self.changes
    }

    /// The line states at `sample`, or None if it is past the end.
    pub fn lines_at(&self, sample: u64) -> Option<LineVector> {
        if sample >= self.num_samples {
            return None;
        }
        let index = self.changes.partition_point(|(p, _)| p.0 <= sample);
        index.checked_sub(1).map(|i| self.changes[i].1)
    }

    fn is_change(&self, sample: u64) -> bool {
        sample > 0
            && self
                .changes
                .binary_search_by_key(&sample, |(p, _)| p.0)
                .is_ok()
    }

    fn next_change_after(&self, sample: u64) -> Option<SamplePosition> {
        let index = self.changes.partition_point(|(p, _)| p.0 <= sample);
        self.changes.get(index).map(|(p, _)| *p)
    }

    pub fn cursor(&self) -> SampleCursor<'_> {
        SampleCursor::new(self)
    }
}

/// A `SignalCursor` over a `Capture`.
///
/// Between two value changes every sample looks the same as the one before
/// it: no edges, and the same levels. So after checking the first sample of
/// such a run the search can jump straight to the next change.
#[derive(Debug, Clone)]
pub struct SampleCursor<'a> {
    capture: &'a Capture,
    next_sample: u64,
    position: SamplePosition,
}

impl<'a> SampleCursor<'a> {
    pub fn new(capture: &'a Capture) -> Self {
        Self {
            capture,
            next_sample: 0,
            position: SamplePosition(0),
        }
    }

    pub fn capture(&self) -> &'a Capture {
        self.capture
    }
}

impl SignalCursor for SampleCursor<'_> {
    fn advance_until(&mut self, condition: &Condition) -> Result<LineVector, DecodeError> {
        let mut sample = self.next_sample;
        while let Some(lines) = self.capture.lines_at(sample) {
            let previous = sample
                .checked_sub(1)
                .and_then(|s| self.capture.lines_at(s));

            if condition.matches(previous.as_ref(), &lines) {
                self.position = SamplePosition(sample);
                self.next_sample = sample + 1;
                return Ok(lines);
            }

            sample = if self.capture.is_change(sample) {
                sample + 1
            } else {
                self.capture
                    .next_change_after(sample)
                    .map_or(self.capture.num_samples, |p| p.0)
            };
        }

        debug!("End of stream after sample {}", self.position);
        self.next_sample = self.capture.num_samples;
        Err(DecodeError::EndOfStream)
    }

    fn position(&self) -> SamplePosition {
        self.position
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cursor::Requirement,
        lines::{ChannelId, READ_STROBE, WRITE_STROBE},
    };

    fn strobes(rs: bool, ws: bool) -> LineVector {
        LineVector::from_fields(rs, ws, 0, 0)
    }

    fn capture(num_samples: u64, changes: &[(u64, LineVector)]) -> Capture {
        Capture::new(
            None,
            num_samples,
            changes
                .iter()
                .map(|&(s, lines)| (SamplePosition(s), lines))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_captures() {
        let lines = LineVector::default();
        assert!(Capture::new(None, 10, vec![(SamplePosition(1), lines)]).is_err());
        assert!(Capture::new(None, 10, vec![]).is_err());
        assert!(Capture::new(None, 10, vec![(SamplePosition(0), lines), (SamplePosition(10), lines)]).is_err());
        assert!(Capture::new(
            None,
            10,
            vec![
                (SamplePosition(0), lines),
                (SamplePosition(5), lines),
                (SamplePosition(5), lines)
            ]
        )
        .is_err());
        assert!(Capture::new(None, 0, vec![]).is_ok());
    }

    #[test]
    fn test_from_samples() {
        let capture = Capture::from_samples(
            Some(0),
            [strobes(true, true), strobes(true, true), strobes(false, true), strobes(false, true)],
        );
        assert_eq!(capture.samplerate, None);
        assert_eq!(capture.num_samples(), 4);
        assert_eq!(
            capture.changes(),
            &[
                (SamplePosition(0), strobes(true, true)),
                (SamplePosition(2), strobes(false, true))
            ]
        );
        assert_eq!(capture.lines_at(1), Some(strobes(true, true)));
        assert_eq!(capture.lines_at(3), Some(strobes(false, true)));
        assert_eq!(capture.lines_at(4), None);
    }

    #[test]
    fn test_from_line_samples_wrong_width() {
        let good = [true; 16];
        let bad = [true; 15];
        let result = Capture::from_line_samples(None, [&good[..], &bad[..]]);
        assert_eq!(
            result,
            Err(DecodeError::MalformedChannelCount {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn test_falling_edge() {
        let capture = capture(
            20,
            &[(0, strobes(true, true)), (5, strobes(false, true)), (9, strobes(true, true))],
        );
        let mut cursor = capture.cursor();
        let condition = Condition::new().with(READ_STROBE, Requirement::Falling);
        let lines = cursor.advance_until(&condition).unwrap();
        assert_eq!(lines, strobes(false, true));
        assert_eq!(cursor.position(), SamplePosition(5));

        let condition = Condition::new().with(READ_STROBE, Requirement::Rising);
        cursor.advance_until(&condition).unwrap();
        assert_eq!(cursor.position(), SamplePosition(9));

        let condition = Condition::new().with(READ_STROBE, Requirement::Falling);
        assert_eq!(cursor.advance_until(&condition), Err(DecodeError::EndOfStream));
        // Stays exhausted.
        assert_eq!(cursor.advance_until(&Condition::new()), Err(DecodeError::EndOfStream));
    }

    #[test]
    fn test_no_edge_at_first_sample() {
        let capture = capture(10, &[(0, strobes(false, true))]);
        let mut cursor = capture.cursor();
        let condition = Condition::new().with(READ_STROBE, Requirement::Falling);
        assert_eq!(cursor.advance_until(&condition), Err(DecodeError::EndOfStream));
    }

    #[test]
    fn test_first_match_wins() {
        let capture = capture(
            20,
            &[(0, strobes(true, true)), (3, strobes(true, false)), (7, strobes(false, false))],
        );
        let mut cursor = capture.cursor();
        let condition = Condition::new()
            .with(READ_STROBE, Requirement::Falling)
            .with(WRITE_STROBE, Requirement::Falling);
        assert_eq!(cursor.advance_until(&condition).unwrap(), strobes(true, false));
        assert_eq!(cursor.position(), SamplePosition(3));
        assert_eq!(cursor.advance_until(&condition).unwrap(), strobes(false, false));
        assert_eq!(cursor.position(), SamplePosition(7));
    }

    #[test]
    fn test_levels() {
        let capture = capture(20, &[(0, strobes(true, true)), (6, strobes(false, true))]);
        let mut cursor = capture.cursor();

        // Already high at the start.
        let high = Condition::new().with(READ_STROBE, Requirement::High);
        cursor.advance_until(&high).unwrap();
        assert_eq!(cursor.position(), SamplePosition(0));
        // The next search starts one sample later.
        cursor.advance_until(&high).unwrap();
        assert_eq!(cursor.position(), SamplePosition(1));

        let low = Condition::new().with(READ_STROBE, Requirement::Low);
        cursor.advance_until(&low).unwrap();
        assert_eq!(cursor.position(), SamplePosition(6));
        cursor.advance_until(&low).unwrap();
        assert_eq!(cursor.position(), SamplePosition(7));
    }

    #[test]
    fn test_stable_after_edge() {
        let capture = capture(20, &[(0, strobes(true, true)), (4, strobes(false, true))]);
        let mut cursor = capture.cursor();
        cursor
            .advance_until(&Condition::new().with(READ_STROBE, Requirement::Either))
            .unwrap();
        assert_eq!(cursor.position(), SamplePosition(4));
        cursor
            .advance_until(&Condition::new().with(READ_STROBE, Requirement::Stable))
            .unwrap();
        assert_eq!(cursor.position(), SamplePosition(5));
    }

    #[test]
    fn test_empty_condition_steps_one_sample() {
        let capture = capture(3, &[(0, strobes(true, true))]);
        let mut cursor = capture.cursor();
        for expected in 0..3 {
            cursor.advance_until(&Condition::new()).unwrap();
            assert_eq!(cursor.position(), SamplePosition(expected));
        }
        assert_eq!(cursor.advance_until(&Condition::new()), Err(DecodeError::EndOfStream));
    }

    #[test]
    fn test_unknown_channel_runs_to_end() {
        let capture = capture(10, &[(0, strobes(true, true)), (4, strobes(false, true))]);
        let mut cursor = capture.cursor();
        let condition = Condition::new().with(ChannelId(20), Requirement::High);
        assert_eq!(cursor.advance_until(&condition), Err(DecodeError::EndOfStream));
    }

    #[test]
    fn test_empty_capture() {
        let capture = Capture::default();
        let mut cursor = capture.cursor();
        assert_eq!(cursor.advance_until(&Condition::new()), Err(DecodeError::EndOfStream));
    }
}
