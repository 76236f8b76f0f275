use serde::Serialize;

use crate::notes::NoteName;

const LOWEST_OCTAVE: i32 = 3;
const HIGHEST_OCTAVE: i32 = 5;
// G3
const LOWEST_MIDI: i32 = 55;
const BLACK_KEY_OFFSET: f32 = 0.3;
const BLACK_KEY_WIDTH_RATIO: f32 = 0.7;

/// One key of the on-screen keyboard, positioned in percent of the keyboard width
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub note: NoteName,
    pub is_sharp: bool,
    pub midi: i32,
    pub left: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardLayout {
    pub keys: Vec<KeyInfo>,
    pub white_key_count: usize,
    pub white_key_width: f32,
}

impl KeyboardLayout {
    /// G3 up to B5
    pub fn new() -> Self {
        let notes: Vec<NoteName> = (LOWEST_OCTAVE..=HIGHEST_OCTAVE)
            .flat_map(|octave| (0..12u8).filter_map(move |pc| NoteName::new(pc, octave).ok()))
            .filter(|note| note.midi() >= LOWEST_MIDI)
            .collect();

        let white_key_count = notes.iter().filter(|n| !n.is_sharp()).count();
        let white_key_width = 100.0 / white_key_count as f32;

        let mut whites_before = 0;
        let keys = notes
            .into_iter()
            .map(|note| {
                let (left, width) = if note.is_sharp() {
                    (
                        (whites_before as f32 - BLACK_KEY_OFFSET) * white_key_width,
                        white_key_width * BLACK_KEY_WIDTH_RATIO,
                    )
                } else {
                    let left = whites_before as f32 * white_key_width;
                    whites_before += 1;
                    (left, white_key_width)
                };
                KeyInfo {
                    note,
                    is_sharp: note.is_sharp(),
                    midi: note.midi(),
                    left,
                    width,
                }
            })
            .collect();

        Self {
            keys,
            white_key_count,
            white_key_width,
        }
    }

    pub fn contains(&self, note: NoteName) -> bool {
        self.keys.iter().any(|key| key.note == note)
    }

    pub fn key(&self, note: NoteName) -> Option<&KeyInfo> {
        self.keys.iter().find(|key| key.note == note)
    }

    pub fn white_keys(&self) -> impl Iterator<Item = &KeyInfo> {
        self.keys.iter().filter(|key| !key.is_sharp)
    }

    pub fn black_keys(&self) -> impl Iterator<Item = &KeyInfo> {
        self.keys.iter().filter(|key| key.is_sharp)
    }
}

impl Default for KeyboardLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// Which keys are held down by the pointer
#[derive(Debug, Default)]
pub struct Keyboard {
    layout: KeyboardLayout,
    pressed: Vec<NoteName>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self) -> &KeyboardLayout {
        &self.layout
    }

    /// Returns true when the key was not already held
    pub fn press(&mut self, note: NoteName) -> Result<bool, String> {
        if !self.layout.contains(note) {
            return Err(format!("Note {} is not on the keyboard", note));
        }
        if self.pressed.contains(&note) {
            return Ok(false);
        }
        self.pressed.push(note);
        Ok(true)
    }

    /// Pointer up or pointer leave. Returns true when the key was held.
    pub fn release(&mut self, note: NoteName) -> bool {
        let before = self.pressed.len();
        self.pressed.retain(|&n| n != note);
        self.pressed.len() != before
    }

    pub fn is_pressed(&self, note: NoteName) -> bool {
        self.pressed.contains(&note)
    }

    pub fn pressed(&self) -> &[NoteName] {
        &self.pressed
    }

    pub fn release_all(&mut self) -> Vec<NoteName> {
        std::mem::take(&mut self.pressed)
    }
}
