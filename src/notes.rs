use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MIN_PITCH_SHIFT: i32 = -24;
pub const MAX_PITCH_SHIFT: i32 = 24;

pub const MIN_OCTAVE: i32 = -1;
pub const MAX_OCTAVE: i32 = 9;

// C-1 and B9
const MIN_MIDI: i32 = 0;
const MAX_MIDI: i32 = 131;

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A note such as `C4` or `F#3`. Only sharps are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteName {
    pitch_class: u8,
    octave: i32,
}

impl NoteName {
    pub fn new(pitch_class: u8, octave: i32) -> Result<Self, String> {
        if pitch_class >= 12 {
            return Err(format!("Invalid pitch class: {}", pitch_class));
        }
        check_octave(octave)?;
        Ok(Self { pitch_class, octave })
    }

    /// Out-of-range numbers clamp to C-1 or B9
    pub fn from_midi(midi: i32) -> Self {
        let midi = midi.clamp(MIN_MIDI, MAX_MIDI);
        Self {
            pitch_class: midi.rem_euclid(12) as u8,
            octave: midi.div_euclid(12) - 1,
        }
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch_class
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn is_sharp(&self) -> bool {
        PITCH_CLASSES[self.pitch_class as usize].ends_with('#')
    }

    pub fn midi(&self) -> i32 {
        note_to_midi(*self)
    }

    pub fn frequency(&self) -> f32 {
        note_to_frequency(*self)
    }
}

impl FromStr for NoteName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(|| format!("Missing octave in note: {}", s))?;
        let (name, octave) = s.split_at(split);

        let pitch_class = PITCH_CLASSES
            .iter()
            .position(|&pc| pc == name)
            .ok_or_else(|| format!("Unknown note name: {}", s))?;
        let octave = octave
            .parse::<i32>()
            .map_err(|_| format!("Invalid octave in note: {}", s))?;
        check_octave(octave).map_err(|e| format!("{} in note: {}", e, s))?;

        Ok(Self {
            pitch_class: pitch_class as u8,
            octave,
        })
    }
}

fn check_octave(octave: i32) -> Result<(), String> {
    if (MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
        Ok(())
    } else {
        Err(format!("Octave {} out of range", octave))
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PITCH_CLASSES[self.pitch_class as usize], self.octave)
    }
}

impl Serialize for NoteName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NoteName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// C4 = 60
pub fn note_to_midi(note: NoteName) -> i32 {
    note.pitch_class as i32 + (note.octave + 1) * 12
}

pub fn midi_to_frequency(midi: i32) -> f32 {
    440.0 * 2f32.powf((midi - 69) as f32 / 12.0)
}

pub fn note_to_frequency(note: NoteName) -> f32 {
    midi_to_frequency(note_to_midi(note))
}

pub fn transpose_note(note: NoteName, semitones: i32) -> NoteName {
    NoteName::from_midi(note_to_midi(note).saturating_add(semitones))
}

pub fn clamp_pitch_shift(semitones: i32) -> i32 {
    semitones.clamp(MIN_PITCH_SHIFT, MAX_PITCH_SHIFT)
}
