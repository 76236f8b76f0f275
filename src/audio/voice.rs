use tracing::debug;

use crate::audio::envelopes::NoteEnvelope;
use crate::audio::oscillators::{Oscillator, Waveform};
use crate::audio::AudioGenerator;
use crate::config::{ranges, VoiceConfig};
use crate::notes::NoteName;

pub const MAX_NOTES: usize = 2;

struct NoteSlot {
    note: NoteName,
    oscillator: Oscillator,
    envelope: NoteEnvelope,
    order: u64,
    released: bool,
}

/// Oscillator voice that can sound at most two notes at once
pub struct DuoVoice {
    slots: Vec<NoteSlot>,
    waveform: Waveform,
    volume: f32,
    note_gain: f32,
    attack: f32,
    release: f32,
    next_order: u64,
    sample_rate: f32,
}

impl DuoVoice {
    pub fn new(config: &VoiceConfig, sample_rate: f32) -> Self {
        Self {
            slots: Vec::with_capacity(MAX_NOTES),
            waveform: config.waveform,
            volume: ranges::VOLUME.clamp(config.volume),
            note_gain: config.note_gain,
            attack: config.attack,
            release: config.release,
            next_order: 0,
            sample_rate,
        }
    }

    /// Start a note. Returns false when the note is already held.
    pub fn note_on(&mut self, note: NoteName) -> bool {
        if self.slots.iter().any(|s| s.note == note && !s.released) {
            debug!("Note {} already held", note);
            return false;
        }

        // A releasing copy of the same note is replaced rather than doubled
        self.slots.retain(|s| s.note != note);

        if self.slots.len() >= MAX_NOTES {
            if let Some(oldest) = self
                .slots
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.order)
                .map(|(i, _)| i)
            {
                debug!("Stealing note {}", self.slots[oldest].note);
                self.slots.remove(oldest);
            }
        }

        let mut envelope = NoteEnvelope::new(self.attack, self.release, self.note_gain, self.sample_rate);
        envelope.trigger();
        self.slots.push(NoteSlot {
            note,
            oscillator: Oscillator::new(self.waveform, note.frequency(), self.sample_rate),
            envelope,
            order: self.next_order,
            released: false,
        });
        self.next_order += 1;
        true
    }

    /// Release a held note. Unknown notes are ignored.
    pub fn note_off(&mut self, note: NoteName) -> bool {
        match self.slots.iter_mut().find(|s| s.note == note && !s.released) {
            Some(slot) => {
                slot.envelope.release();
                slot.released = true;
                true
            }
            None => false,
        }
    }

    pub fn stop_all_notes(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| !s.released) {
            slot.envelope.release();
            slot.released = true;
        }
    }

    /// Notes that are held, oldest first
    pub fn active_notes(&self) -> Vec<NoteName> {
        let mut held: Vec<&NoteSlot> = self.slots.iter().filter(|s| !s.released).collect();
        held.sort_by_key(|s| s.order);
        held.into_iter().map(|s| s.note).collect()
    }

    /// Notes still producing sound, including release tails
    pub fn sounding_count(&self) -> usize {
        self.slots.len()
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = ranges::VOLUME.clamp(volume);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
        for slot in &mut self.slots {
            slot.oscillator.set_waveform(waveform);
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }
}

impl AudioGenerator for DuoVoice {
    fn next_sample(&mut self) -> f32 {
        let mut output = 0.0;
        for slot in &mut self.slots {
            let gain = slot.envelope.next_sample();
            output += slot.oscillator.next_sample() * gain;
        }

        // Free slots whose release ramp has finished
        self.slots.retain(|s| !s.released || s.envelope.is_active());

        output * self.volume
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for slot in &mut self.slots {
            slot.oscillator.set_sample_rate(sample_rate);
            slot.envelope.set_sample_rate(sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(s: &str) -> NoteName {
        s.parse().unwrap()
    }

    fn voice(sample_rate: f32) -> DuoVoice {
        DuoVoice::new(&VoiceConfig::default(), sample_rate)
    }

    #[test]
    fn test_held_note_is_not_retriggered() {
        let mut voice = voice(44100.0);
        assert!(voice.note_on(note("C4")));
        assert!(!voice.note_on(note("C4")));
        assert_eq!(voice.active_notes(), vec![note("C4")]);
    }

    #[test]
    fn test_third_note_steals_oldest() {
        let mut voice = voice(44100.0);
        voice.note_on(note("C4"));
        voice.note_on(note("E4"));
        voice.note_on(note("G4"));
        assert_eq!(voice.active_notes(), vec![note("E4"), note("G4")]);
        assert_eq!(voice.sounding_count(), 2);
    }

    #[test]
    fn test_attack_reaches_half_gain_in_10ms() {
        let sample_rate = 1000.0;
        let mut voice = voice(sample_rate);
        voice.set_volume(1.0);
        voice.set_waveform(Waveform::Square);
        voice.note_on(note("A1"));

        let mut peak = 0.0f32;
        for _ in 0..10 {
            voice.next_sample();
        }
        for _ in 0..100 {
            peak = peak.max(voice.next_sample().abs());
        }
        println!("Peak after attack {:.3}", peak);
        assert!(peak > 0.45 && peak <= 0.55);
    }

    #[test]
    fn test_release_frees_slot_after_100ms() {
        let sample_rate = 1000.0;
        let mut voice = voice(sample_rate);
        voice.note_on(note("C4"));
        for _ in 0..20 {
            voice.next_sample();
        }
        assert!(voice.note_off(note("C4")));
        assert!(voice.active_notes().is_empty());
        assert_eq!(voice.sounding_count(), 1, "release tail still sounds");

        for _ in 0..100 {
            voice.next_sample();
        }
        assert_eq!(voice.sounding_count(), 0);
        assert_eq!(voice.next_sample(), 0.0);
    }

    #[test]
    fn test_unknown_note_off_is_ignored() {
        let mut voice = voice(44100.0);
        assert!(!voice.note_off(note("D4")));
    }

    #[test]
    fn test_stop_all_notes() {
        let mut voice = voice(44100.0);
        voice.note_on(note("C4"));
        voice.note_on(note("D4"));
        voice.stop_all_notes();
        assert!(voice.active_notes().is_empty());
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut voice = voice(44100.0);
        assert_eq!(voice.volume(), 0.3);
        voice.set_volume(3.0);
        assert_eq!(voice.volume(), 2.0);
        voice.set_volume(-1.0);
        assert_eq!(voice.volume(), 0.0);
    }
}
