//! # Playback Scheduler
//!
//! Note sequences are laid out as a logical schedule of `(offset, action)`
//! pairs and fired by one scheduler polled from the host's tick loop.
//! Starting a sequence drops everything still pending from the previous
//! one, so a rapid re-trigger never overlaps two sequences.

use std::collections::VecDeque;

/// Something that happens at a point in a sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackAction {
    /// Start a tone.
    Tone { frequency: f64, duration: f64 },
    /// Show the multiple-choice answers for the current interval.
    RevealOptions,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    /// Seconds after the sequence starts.
    pub offset: f64,
    pub action: PlaybackAction,
}

/// An ordered list of events plus the time the sequence counts as playing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    events: Vec<ScheduledEvent>,
    length: f64,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evenly spaced notes: one every `step` seconds, each lasting
    /// `note_duration`. The sequence length is `notes × step`.
    pub fn evenly_spaced(frequencies: &[f64], step: f64, note_duration: f64) -> Self {
        let mut sequence = Self::new();
        for (i, &frequency) in frequencies.iter().enumerate() {
            sequence.push_tone(i as f64 * step, frequency, note_duration);
        }
        sequence.length = frequencies.len() as f64 * step;
        sequence
    }

    pub fn push(&mut self, offset: f64, action: PlaybackAction) -> &mut Self {
        self.events.push(ScheduledEvent { offset, action });
        let end = match action {
            PlaybackAction::Tone { duration, .. } => offset + duration,
            PlaybackAction::RevealOptions => offset,
        };
        self.length = self.length.max(end);
        self
    }

    pub fn push_tone(&mut self, offset: f64, frequency: f64, duration: f64) -> &mut Self {
        self.push(offset, PlaybackAction::Tone { frequency, duration })
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Frequencies of the tone events in schedule order.
    pub fn frequencies(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|event| match event.action {
                PlaybackAction::Tone { frequency, .. } => Some(frequency),
                PlaybackAction::RevealOptions => None,
            })
            .collect()
    }
}

/// Single cancellable executor for playback sequences.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    pending: VecDeque<(f64, PlaybackAction)>,
    ends_at: Option<f64>,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever is scheduled with `sequence`, starting at `now`.
    ///
    /// Returns the number of events that were cancelled.
    pub fn start(&mut self, sequence: &Sequence, now: f64) -> usize {
        let cancelled = self.cancel_all();
        let mut events: Vec<(f64, PlaybackAction)> = sequence
            .events()
            .iter()
            .map(|event| (now + event.offset, event.action))
            .collect();
        // Stable, so simultaneous events keep their push order.
        events.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.pending = events.into();
        self.ends_at = Some(now + sequence.length());
        tracing::debug!(events = self.pending.len(), cancelled, "playback sequence started");
        cancelled
    }

    /// Drops every pending event. Returns how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.ends_at = None;
        cancelled
    }

    /// Removes and returns, in order, every event due at or before `now`,
    /// each with its scheduled clock time.
    pub fn poll(&mut self, now: f64) -> Vec<(f64, PlaybackAction)> {
        let mut due = Vec::new();
        while let Some(&(at, action)) = self.pending.front() {
            if at > now {
                break;
            }
            self.pending.pop_front();
            due.push((at, action));
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// True while the current sequence has not reached its end.
    pub fn is_playing(&self, now: f64) -> bool {
        self.ends_at.is_some_and(|end| now < end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frequency: f64) -> PlaybackAction {
        PlaybackAction::Tone {
            frequency,
            duration: 0.8,
        }
    }

    #[test]
    fn evenly_spaced_layout() {
        let sequence = Sequence::evenly_spaced(&[100.0, 200.0, 300.0], 0.9, 0.8);
        let offsets: Vec<f64> = sequence.events().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0.0, 0.9, 1.8]);
        assert!((sequence.length() - 2.7).abs() < 1e-12);
        assert_eq!(sequence.frequencies(), vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn poll_fires_in_order() {
        let mut scheduler = PlaybackScheduler::new();
        let sequence = Sequence::evenly_spaced(&[100.0, 200.0, 300.0], 1.0, 0.8);
        scheduler.start(&sequence, 10.0);

        assert_eq!(scheduler.poll(10.0), vec![(10.0, tone(100.0))]);
        assert!(scheduler.poll(10.5).is_empty());
        // A late poll still reports when each event was due.
        assert_eq!(scheduler.poll(12.0), vec![(11.0, tone(200.0)), (12.0, tone(300.0))]);
        assert_eq!(scheduler.pending(), 0);
        assert!(scheduler.is_playing(12.5));
        assert!(!scheduler.is_playing(13.0));
    }

    #[test]
    fn new_sequence_cancels_previous() {
        let mut scheduler = PlaybackScheduler::new();
        let a = Sequence::evenly_spaced(&[100.0, 110.0, 120.0, 130.0], 1.0, 0.8);
        let b = Sequence::evenly_spaced(&[500.0, 510.0], 1.0, 0.8);

        scheduler.start(&a, 0.0);
        assert_eq!(scheduler.poll(0.0), vec![(0.0, tone(100.0))]);
        assert_eq!(scheduler.start(&b, 0.5), 3);

        let mut fired = Vec::new();
        for step in 0..50 {
            fired.extend(scheduler.poll(0.5 + step as f64 * 0.1).into_iter().map(|(_, action)| action));
        }
        assert_eq!(fired, vec![tone(500.0), tone(510.0)]);
    }

    #[test]
    fn cancel_all_stops_playing() {
        let mut scheduler = PlaybackScheduler::new();
        scheduler.start(&Sequence::evenly_spaced(&[100.0, 200.0], 1.0, 0.8), 0.0);
        assert!(scheduler.is_playing(0.1));
        assert_eq!(scheduler.cancel_all(), 2);
        assert!(!scheduler.is_playing(0.1));
        assert!(scheduler.poll(100.0).is_empty());
    }

    #[test]
    fn reveal_events_are_ordered_with_tones() {
        let mut sequence = Sequence::new();
        sequence
            .push_tone(0.0, 440.0, 1.0)
            .push(2.5, PlaybackAction::RevealOptions)
            .push_tone(1.2, 660.0, 1.0);
        assert!((sequence.length() - 2.5).abs() < 1e-12);

        let mut scheduler = PlaybackScheduler::new();
        scheduler.start(&sequence, 0.0);
        let fired: Vec<PlaybackAction> = scheduler.poll(3.0).into_iter().map(|(_, action)| action).collect();
        assert_eq!(
            fired,
            vec![
                PlaybackAction::Tone { frequency: 440.0, duration: 1.0 },
                PlaybackAction::Tone { frequency: 660.0, duration: 1.0 },
                PlaybackAction::RevealOptions,
            ]
        );
    }
}
