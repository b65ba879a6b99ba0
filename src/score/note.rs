use crate::error::ScoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A pitch as a MIDI note number. Displays as a scientific pitch name where
/// middle C (60) is `C4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pitch(pub u8);

impl Pitch {
    pub fn midi(self) -> u8 {
        self.0
    }

    /// Equal-tempered frequency with A4 = 440 Hz.
    pub fn frequency(self) -> f32 {
        440.0 * 2.0_f32.powf((self.0 as f32 - 69.0) / 12.0)
    }
}

impl From<u8> for Pitch {
    fn from(value: u8) -> Self {
        Pitch(value)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octave = (self.0 / 12) as i32 - 1;
        write!(f, "{}{}", NOTE_NAMES[(self.0 % 12) as usize], octave)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePitchError(pub String);

impl fmt::Display for ParsePitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pitch name '{}'", self.0)
    }
}

impl std::error::Error for ParsePitchError {}

impl FromStr for Pitch {
    type Err = ParsePitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePitchError(s.to_string());
        let mut chars = s.trim().chars();

        let class = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(err()),
        };

        let rest: String = chars.collect();
        let (accidental, octave) = if let Some(o) = rest.strip_prefix('#') {
            (1, o)
        } else if let Some(o) = rest.strip_prefix('b') {
            (-1, o)
        } else {
            (0, rest.as_str())
        };

        let octave: i32 = octave.parse().map_err(|_| err())?;
        let midi = (octave + 1) * 12 + class + accidental;
        u8::try_from(midi)
            .ok()
            .filter(|m| *m <= 127)
            .map(Pitch)
            .ok_or_else(err)
    }
}

/// A single pitched sound of a score. Times are seconds relative to the
/// start of the score. Deserialized notes go through [`try_new`](Self::try_new).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNote")]
pub struct NoteEvent {
    pitch: Pitch,
    start_time: f64,
    duration: f64,
    velocity: f32,
}

#[derive(Deserialize)]
struct RawNote {
    pitch: Pitch,
    start_time: f64,
    duration: f64,
    velocity: f32,
}

impl TryFrom<RawNote> for NoteEvent {
    type Error = ScoreError;

    fn try_from(raw: RawNote) -> Result<Self, Self::Error> {
        NoteEvent::try_new(raw.pitch, raw.start_time, raw.duration, raw.velocity)
    }
}

impl NoteEvent {
    /// Clamps instead of rejecting: start time and duration to finite values
    /// `>= 0`, velocity to `[0, 1]`.
    pub fn new(pitch: impl Into<Pitch>, start_time: f64, duration: f64, velocity: f32) -> Self {
        let finite = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            pitch: pitch.into(),
            start_time: finite(start_time),
            duration: finite(duration),
            velocity: if velocity.is_nan() {
                0.0
            } else {
                velocity.clamp(0.0, 1.0)
            },
        }
    }

    /// Builds a note only if the start time is finite and `>= 0`, the duration
    /// finite and `> 0`, and the velocity within `[0, 1]`.
    pub fn try_new(
        pitch: impl Into<Pitch>,
        start_time: f64,
        duration: f64,
        velocity: f32,
    ) -> Result<Self, ScoreError> {
        if !(start_time.is_finite() && start_time >= 0.0) {
            return Err(ScoreError::StartTime(start_time));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(ScoreError::Duration(duration));
        }
        if !(0.0..=1.0).contains(&velocity) {
            return Err(ScoreError::Velocity(velocity));
        }
        Ok(Self {
            pitch: pitch.into(),
            start_time,
            duration,
            velocity,
        })
    }

    pub fn pitch(&self) -> Pitch {
        self.pitch
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_names() {
        assert_eq!(Pitch(60).to_string(), "C4");
        assert_eq!(Pitch(64).to_string(), "E4");
        assert_eq!(Pitch(69).to_string(), "A4");
        assert_eq!(Pitch(61).to_string(), "C#4");
        assert_eq!(Pitch(0).to_string(), "C-1");
    }

    #[test]
    fn test_pitch_parse() {
        assert_eq!("C4".parse::<Pitch>(), Ok(Pitch(60)));
        assert_eq!("f#3".parse::<Pitch>(), Ok(Pitch(54)));
        assert_eq!("Bb2".parse::<Pitch>(), Ok(Pitch(46)));
        assert_eq!("C-1".parse::<Pitch>(), Ok(Pitch(0)));
        assert!("H2".parse::<Pitch>().is_err());
        assert!("C".parse::<Pitch>().is_err());
        assert!("G10".parse::<Pitch>().is_err());
    }

    #[test]
    fn test_frequency() {
        assert!((Pitch(69).frequency() - 440.0).abs() < 1e-3);
        assert!((Pitch(57).frequency() - 220.0).abs() < 1e-3);
    }

    #[test]
    fn test_note_event_clamps() {
        let note = NoteEvent::new(60, -1.0, 0.5, 1.5);
        assert_eq!(note.start_time(), 0.0);
        assert_eq!(note.velocity(), 1.0);
        assert_eq!(note.end_time(), 0.5);

        let note = NoteEvent::new(60, f64::NAN, f64::INFINITY, f32::NAN);
        assert_eq!(note.start_time(), 0.0);
        assert_eq!(note.duration(), 0.0);
        assert_eq!(note.velocity(), 0.0);
    }

    #[test]
    fn test_try_new_rejects_out_of_range() {
        assert!(NoteEvent::try_new(60, 0.0, 0.5, 1.0).is_ok());
        assert_eq!(
            NoteEvent::try_new(60, -2.0, 1.0, 0.5),
            Err(ScoreError::StartTime(-2.0))
        );
        assert!(matches!(
            NoteEvent::try_new(60, f64::NAN, 1.0, 0.5),
            Err(ScoreError::StartTime(_))
        ));
        assert_eq!(
            NoteEvent::try_new(60, 0.0, 0.0, 0.5),
            Err(ScoreError::Duration(0.0))
        );
        assert_eq!(
            NoteEvent::try_new(60, 0.0, -1.0, 0.5),
            Err(ScoreError::Duration(-1.0))
        );
        assert_eq!(
            NoteEvent::try_new(60, 0.0, f64::INFINITY, 0.5),
            Err(ScoreError::Duration(f64::INFINITY))
        );
        assert_eq!(
            NoteEvent::try_new(60, 0.0, 1.0, 5.0),
            Err(ScoreError::Velocity(5.0))
        );
        assert!(matches!(
            NoteEvent::try_new(60, 0.0, 1.0, f32::NAN),
            Err(ScoreError::Velocity(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_out_of_range() {
        let note: NoteEvent =
            ron::from_str("(pitch: 60, start_time: 0.5, duration: 1.0, velocity: 0.8)").unwrap();
        assert_eq!(note.end_time(), 1.5);

        for source in [
            "(pitch: 60, start_time: -2.0, duration: 1.0, velocity: 0.5)",
            "(pitch: 60, start_time: 0.0, duration: -1.0, velocity: 0.5)",
            "(pitch: 60, start_time: 0.0, duration: 0.0, velocity: 0.5)",
            "(pitch: 60, start_time: 0.0, duration: 1.0, velocity: 5.0)",
        ] {
            assert!(ron::from_str::<NoteEvent>(source).is_err(), "{source}");
        }
    }
}
