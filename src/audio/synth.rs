use tracing::{debug, info, warn};

use crate::audio::machine::{EffectsEvent, EffectsMachine, EffectsSnapshot, EffectsState};
use crate::audio::oscillators::Waveform;
use crate::audio::routing::{connect_instrument, EffectsChain, InstrumentRoute};
use crate::audio::voice::DuoVoice;
use crate::audio::AudioGenerator;
use crate::commands::AudioCommand;
use crate::config::SynthConfig;
use crate::events::{ServerEvent, ServerEventSender};
use crate::notes::{clamp_pitch_shift, transpose_note, NoteName};

/// The keyboard voice, the effects machine and the output chain,
/// clocked by one absolute sample counter.
pub struct Synth {
    voice: DuoVoice,
    machine: EffectsMachine,
    chain: EffectsChain,
    route: InstrumentRoute,
    pitch_shift: i32,
    clock: u64,
    event_sender: ServerEventSender,
    sample_rate: f32,
}

impl Synth {
    pub fn new(config: &SynthConfig, sample_rate: f32, event_sender: ServerEventSender) -> Self {
        let config = config.clone().clamped();
        Self {
            voice: DuoVoice::new(&config.voice, sample_rate),
            machine: EffectsMachine::new(config.effects, config.output.clone(), sample_rate),
            chain: EffectsChain::new(&config.output, sample_rate),
            route: InstrumentRoute::Direct,
            pitch_shift: 0,
            clock: 0,
            event_sender,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.voice.set_sample_rate(sample_rate);
        self.machine.set_sample_rate(sample_rate);
        self.chain.set_sample_rate(sample_rate);
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn route(&self) -> InstrumentRoute {
        self.route
    }

    pub fn effects_state(&self) -> EffectsState {
        self.machine.state()
    }

    pub fn machine(&self) -> &EffectsMachine {
        &self.machine
    }

    pub fn snapshot(&self) -> EffectsSnapshot {
        self.machine.snapshot()
    }

    pub fn active_notes(&self) -> Vec<NoteName> {
        self.voice.active_notes()
    }

    pub fn pitch_shift(&self) -> i32 {
        self.pitch_shift
    }

    /// Transpose played notes by `semitones`, clamped to two octaves either way.
    /// Held notes are released when the shift changes.
    pub fn set_pitch_shift(&mut self, semitones: i32) {
        let semitones = clamp_pitch_shift(semitones);
        if semitones == self.pitch_shift {
            return;
        }
        info!("Pitch shift set to {} semitones", semitones);
        self.stop_all_notes();
        self.pitch_shift = semitones;
    }

    pub fn note_on(&mut self, note: NoteName) {
        let note = transpose_note(note, self.pitch_shift);
        if self.voice.note_on(note) {
            self.emit_active_notes();
        }
    }

    pub fn note_off(&mut self, note: NoteName) {
        let note = transpose_note(note, self.pitch_shift);
        if self.voice.note_off(note) {
            self.emit_active_notes();
        }
    }

    pub fn stop_all_notes(&mut self) {
        self.voice.stop_all_notes();
        self.emit_active_notes();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.voice.set_volume(volume);
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.voice.set_waveform(waveform);
    }

    /// Feed one event to the effects machine, then reconnect the voice.
    /// Returns false when the machine ignored the event.
    pub fn send_effects_event(&mut self, event: EffectsEvent) -> bool {
        self.machine.advance(self.clock);
        let handled = self.machine.send(event);
        if !handled {
            debug!("Effects machine ignored {:?}", event);
            return false;
        }

        self.route = connect_instrument(self.machine.context_mut());
        let success = self.machine.context().routing.is_some();
        if !success && self.machine.state() == EffectsState::Active {
            warn!("Routing rebuild failed, instrument stays direct");
        }

        self.event_sender.send(ServerEvent::EffectsState(self.machine.snapshot()));
        self.event_sender.send(ServerEvent::RoutingRebuilt {
            success,
            route: self.route,
        });
        true
    }

    /// Apply a single command from the UI thread
    pub fn apply_command(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::NoteOn(note) => self.note_on(note),
            AudioCommand::NoteOff(note) => self.note_off(note),
            AudioCommand::StopAllNotes => self.stop_all_notes(),
            AudioCommand::SetVolume(volume) => self.set_volume(volume),
            AudioCommand::SetPitchShift(semitones) => self.set_pitch_shift(semitones),
            AudioCommand::SetWaveform(waveform) => {
                info!("Waveform set to {:?}", waveform);
                self.set_waveform(waveform)
            }
            AudioCommand::Effects(event) => {
                self.send_effects_event(event);
            }
        }
    }

    pub fn next_sample(&mut self) -> (f32, f32) {
        self.machine.advance(self.clock);

        let dry = self.voice.next_sample();
        let now = self.clock;
        let out = self
            .chain
            .render(self.machine.context_mut(), self.route, now, dry, dry);

        self.clock += 1;
        out
    }

    /// Fill an interleaved stereo buffer
    pub fn generate(&mut self, data: &mut [f32]) {
        for frame in data.chunks_mut(2) {
            let (left, right) = self.next_sample();
            frame[0] = left;
            if let Some(r) = frame.get_mut(1) {
                *r = right;
            }
        }
    }

    fn emit_active_notes(&self) {
        self.event_sender.send(ServerEvent::ActiveNotes(self.voice.active_notes()));
    }
}
