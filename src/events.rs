use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::audio::effects::EffectType;
use crate::audio::machine::{EffectsEvent, EffectsSnapshot};
use crate::audio::oscillators::Waveform;
use crate::audio::routing::InstrumentRoute;
use crate::commands::AudioCommand;
use crate::notes::NoteName;

/// Client event - sent from frontend to backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientEvent {
    /// Target node (e.g., "voice", "filter", "effects")
    pub node: String,
    /// Event name (e.g., "note_on", "set_wet", "toggle")
    pub event: String,
    /// Numeric parameter (for booleans: 0.0 = false, 1.0 = true)
    #[serde(default)]
    pub parameter: f32,
    /// Text parameter: note name, waveform or effect name
    #[serde(default)]
    pub value: Option<String>,
}

impl ClientEvent {
    pub fn new(node: &str, event: &str, parameter: f32) -> Self {
        Self {
            node: node.to_string(),
            event: event.to_string(),
            parameter,
            value: None,
        }
    }

    pub fn with_value(node: &str, event: &str, value: &str) -> Self {
        Self {
            node: node.to_string(),
            event: event.to_string(),
            parameter: 0.0,
            value: Some(value.to_string()),
        }
    }

    /// Get parameter as boolean (0.0 = false, non-zero = true)
    pub fn as_bool(&self) -> bool {
        self.parameter != 0.0
    }

    fn value(&self) -> Result<&str, String> {
        self.value
            .as_deref()
            .ok_or_else(|| format!("{} {} needs a value", self.node, self.event))
    }

    fn note(&self) -> Result<NoteName, String> {
        self.value()?.parse()
    }

    fn unknown(&self) -> String {
        format!("Unknown {} event: {}", self.node, self.event)
    }

    /// Translate the event into a command for the audio thread
    pub fn to_command(&self) -> Result<AudioCommand, String> {
        let p = self.parameter;
        let effects =
            |event: EffectsEvent| -> Result<AudioCommand, String> { Ok(AudioCommand::Effects(event)) };

        match self.node.as_str() {
            "voice" => match self.event.as_str() {
                "note_on" => Ok(AudioCommand::NoteOn(self.note()?)),
                "note_off" => Ok(AudioCommand::NoteOff(self.note()?)),
                "stop_all_notes" => Ok(AudioCommand::StopAllNotes),
                "set_volume" => Ok(AudioCommand::SetVolume(p)),
                "set_pitch_shift" => Ok(AudioCommand::SetPitchShift(p.round() as i32)),
                "set_waveform" => Ok(AudioCommand::SetWaveform(Waveform::from_name(self.value()?)?)),
                _ => Err(self.unknown()),
            },
            "effects" => match self.event.as_str() {
                "init" => effects(EffectsEvent::InitEffects),
                "dispose" => effects(EffectsEvent::DisposeEffects),
                "toggle" => effects(EffectsEvent::ToggleEffect {
                    effect: EffectType::from_name(self.value()?)?,
                    enabled: self.as_bool(),
                }),
                _ => Err(self.unknown()),
            },
            "filter" => match self.event.as_str() {
                "set_frequency" => effects(EffectsEvent::UpdateFilterFrequency { frequency: p }),
                "set_depth" => effects(EffectsEvent::UpdateFilterDepth { depth: p }),
                "set_resonance" => effects(EffectsEvent::UpdateFilterResonance { resonance: p }),
                "set_wet" => effects(EffectsEvent::UpdateFilterWet { wet: p }),
                _ => Err(self.unknown()),
            },
            "delay" => match self.event.as_str() {
                "set_delay_time" => effects(EffectsEvent::UpdateDelayTime { delay_time: p }),
                "set_feedback" => effects(EffectsEvent::UpdateDelayFeedback { feedback: p }),
                "set_wet" => effects(EffectsEvent::UpdateDelayWet { wet: p }),
                _ => Err(self.unknown()),
            },
            "reverb" => match self.event.as_str() {
                "set_decay" => effects(EffectsEvent::UpdateReverbDecay { decay: p }),
                "set_pre_delay" => effects(EffectsEvent::UpdateReverbPreDelay { pre_delay: p }),
                "set_wet" => effects(EffectsEvent::UpdateReverbWet { wet: p }),
                _ => Err(self.unknown()),
            },
            "distortion" => match self.event.as_str() {
                "set_amount" => effects(EffectsEvent::UpdateDistortionAmount { distortion: p }),
                "set_wet" => effects(EffectsEvent::UpdateDistortionWet { wet: p }),
                "set_tone" => effects(EffectsEvent::UpdateDistortionTone { tone: p }),
                "set_level" => effects(EffectsEvent::UpdateDistortionLevel { level: p }),
                _ => Err(self.unknown()),
            },
            "phaser" => match self.event.as_str() {
                "set_rate" => effects(EffectsEvent::UpdatePhaserRate { rate: p }),
                "set_depth" => effects(EffectsEvent::UpdatePhaserDepth { depth: p }),
                "set_feedback" => effects(EffectsEvent::UpdatePhaserFeedback { feedback: p }),
                "set_wet" => effects(EffectsEvent::UpdatePhaserWet { wet: p }),
                _ => Err(self.unknown()),
            },
            _ => Err(format!("Unknown node: {}", self.node)),
        }
    }
}

// Server events for audio -> UI communication
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerEvent {
    EffectsState(EffectsSnapshot),
    ActiveNotes(Vec<NoteName>),
    RoutingRebuilt { success: bool, route: InstrumentRoute },
}

impl ServerEvent {
    /// Name the frontend listens on
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::EffectsState(_) => "effects-state",
            ServerEvent::ActiveNotes(_) => "active-notes",
            ServerEvent::RoutingRebuilt { .. } => "routing-rebuilt",
        }
    }
}

/// Lock-free event queue for audio -> UI communication
pub struct ServerEventQueue {
    queue: Arc<SegQueue<ServerEvent>>,
}

impl ServerEventQueue {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
        }
    }

    /// Get a handle for sending events (for audio thread)
    pub fn sender(&self) -> ServerEventSender {
        ServerEventSender {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Get a handle for receiving events (for UI thread)
    pub fn receiver(&self) -> ServerEventReceiver {
        ServerEventReceiver {
            queue: Arc::clone(&self.queue),
        }
    }
}

#[derive(Clone)]
pub struct ServerEventSender {
    queue: Arc<SegQueue<ServerEvent>>,
}

impl ServerEventSender {
    /// Send an event to the UI thread (non-blocking)
    pub fn send(&self, event: ServerEvent) {
        self.queue.push(event);
    }
}

pub struct ServerEventReceiver {
    queue: Arc<SegQueue<ServerEvent>>,
}

impl ServerEventReceiver {
    /// Drain all pending events
    pub fn process_events<F>(&self, mut emit_event: F)
    where
        F: FnMut(ServerEvent),
    {
        while let Some(event) = self.queue.pop() {
            emit_event(event);
        }
    }
}

impl Default for ServerEventQueue {
    fn default() -> Self {
        Self::new()
    }
}
