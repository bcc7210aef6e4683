use derive_more::{Display, From, Into};

use crate::{
    error::DecodeError,
    lines::{ChannelId, LineVector},
};

/// A point in the capture, counted in samples from its start.
#[derive(From, Into, Display, Debug, Default, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SamplePosition(pub u64);

/// What a single channel has to do for a condition term to match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Requirement {
    Low,
    High,
    Rising,
    Falling,
    /// Rising or falling.
    Either,
    /// No edge.
    Stable,
}

impl Requirement {
    /// `previous` is None at the first sample of a capture, where no edge can
    /// be seen.
    pub fn matches(self, previous: Option<bool>, current: bool) -> bool {
        match self {
            Requirement::Low => !current,
            Requirement::High => current,
            Requirement::Rising => previous == Some(false) && current,
            Requirement::Falling => previous == Some(true) && !current,
            Requirement::Either => previous.map_or(false, |p| p != current),
            Requirement::Stable => previous.map_or(true, |p| p == current),
        }
    }
}

/// A set of (channel, requirement) terms. The condition holds at a sample as
/// soon as any one of its terms does. An empty condition holds at every
/// sample. A term on a channel the bus doesn't have never matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Condition {
    terms: Vec<(ChannelId, Requirement)>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: ChannelId, requirement: Requirement) -> Self {
        self.terms.push((channel, requirement));
        self
    }

    pub fn terms(&self) -> &[(ChannelId, Requirement)] {
        &self.terms
    }

    pub fn matches(&self, previous: Option<&LineVector>, current: &LineVector) -> bool {
        self.terms.is_empty()
            || self.terms.iter().any(|&(channel, requirement)| {
                current.get(channel).map_or(false, |line| {
                    requirement.matches(previous.and_then(|p| p.get(channel)), line)
                })
            })
    }
}

/// Forward-only access to the line states of a capture.
pub trait SignalCursor {
    /// Move forward to the next sample at which `condition` holds and return
    /// the line states there. The search starts at the sample after the
    /// previous match. Returns `DecodeError::EndOfStream` if the capture ends
    /// first.
    fn advance_until(&mut self, condition: &Condition) -> Result<LineVector, DecodeError>;

    /// The sample of the last match.
    fn position(&self) -> SamplePosition;
}

impl<C> SignalCursor for &mut C
where
    C: SignalCursor + ?Sized,
{
    fn advance_until(&mut self, condition: &Condition) -> Result<LineVector, DecodeError> {
        (**self).advance_until(condition)
    }

    fn position(&self) -> SamplePosition {
        (**self).position()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lines::{READ_STROBE, WRITE_STROBE};

    #[test]
    fn test_edges_need_a_previous_sample() {
        for requirement in [Requirement::Rising, Requirement::Falling, Requirement::Either] {
            assert!(!requirement.matches(None, false));
            assert!(!requirement.matches(None, true));
        }
        assert!(Requirement::Stable.matches(None, true));
        assert!(Requirement::Low.matches(None, false));
        assert!(Requirement::High.matches(None, true));
    }

    #[test]
    fn test_edges() {
        assert!(Requirement::Falling.matches(Some(true), false));
        assert!(!Requirement::Falling.matches(Some(false), false));
        assert!(Requirement::Rising.matches(Some(false), true));
        assert!(!Requirement::Rising.matches(Some(true), true));
        assert!(Requirement::Either.matches(Some(true), false));
        assert!(!Requirement::Either.matches(Some(true), true));
        assert!(Requirement::Stable.matches(Some(false), false));
        assert!(!Requirement::Stable.matches(Some(false), true));
    }

    #[test]
    fn test_any_term_matches() {
        let idle = LineVector::from_fields(true, true, 0, 0);
        let read = LineVector::from_fields(false, true, 0, 0);
        let write = LineVector::from_fields(true, false, 0, 0);

        let condition = Condition::new()
            .with(READ_STROBE, Requirement::Falling)
            .with(WRITE_STROBE, Requirement::Falling);

        assert!(condition.matches(Some(&idle), &read));
        assert!(condition.matches(Some(&idle), &write));
        assert!(!condition.matches(Some(&idle), &idle));
        assert!(!condition.matches(Some(&read), &read));
        assert!(!condition.matches(None, &read));
    }

    #[test]
    fn test_unknown_channel_never_matches() {
        let lines = LineVector::from_bits(0xFFFF);
        let missing = ChannelId(20);
        for requirement in [Requirement::High, Requirement::Stable, Requirement::Either] {
            let condition = Condition::new().with(missing, requirement);
            assert!(!condition.matches(None, &lines));
            assert!(!condition.matches(Some(&lines), &lines));
        }
        // The other terms still count.
        let condition = Condition::new()
            .with(missing, Requirement::High)
            .with(READ_STROBE, Requirement::High);
        assert!(condition.matches(None, &lines));
    }

    #[test]
    fn test_empty_condition() {
        let lines = LineVector::default();
        assert!(Condition::new().matches(None, &lines));
        assert!(Condition::new().matches(Some(&lines), &lines));
    }
}
