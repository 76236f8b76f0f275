use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::audio::delays::FeedbackDelay;
use crate::audio::dynamics::Gain;
use crate::audio::effects::{AutoFilter, Distortion, EffectType, Phaser};
use crate::audio::modulators::LfoState;
use crate::audio::reverbs::Reverb;
use crate::audio::routing::{ensure_audio_routing, RoutingPlan};
use crate::audio::{sec_to_samples, AudioNode};
use crate::config::{ranges, EffectParams, OutputConfig};

/// Delay between a filter change and the LFO restart, and between the
/// restart and the LFO actually running
const RESTART_DELAY_SECONDS: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectsState {
    Inactive,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectsEvent {
    InitEffects,
    DisposeEffects,
    UpdateFilterFrequency {
        frequency: f32,
    },
    UpdateFilterDepth {
        depth: f32,
    },
    UpdateFilterWet {
        wet: f32,
    },
    UpdateFilterResonance {
        resonance: f32,
    },
    UpdateDelayTime {
        #[serde(rename = "delayTime")]
        delay_time: f32,
    },
    UpdateDelayFeedback {
        feedback: f32,
    },
    UpdateDelayWet {
        wet: f32,
    },
    UpdateReverbDecay {
        decay: f32,
    },
    #[serde(rename = "UPDATE_REVERB_PREDELAY")]
    UpdateReverbPreDelay {
        #[serde(rename = "preDelay")]
        pre_delay: f32,
    },
    UpdateReverbWet {
        wet: f32,
    },
    UpdateDistortionAmount {
        distortion: f32,
    },
    UpdateDistortionWet {
        wet: f32,
    },
    UpdateDistortionTone {
        tone: f32,
    },
    UpdateDistortionLevel {
        level: f32,
    },
    UpdatePhaserRate {
        rate: f32,
    },
    UpdatePhaserDepth {
        depth: f32,
    },
    UpdatePhaserFeedback {
        feedback: f32,
    },
    UpdatePhaserWet {
        wet: f32,
    },
    ToggleEffect {
        effect: EffectType,
        enabled: bool,
    },
}

/// Everything the effects machine owns: nodes, remembered parameters and
/// the current routing.
pub struct EffectsContext {
    pub effects_bus: Option<Gain>,
    pub auto_filter: Option<AutoFilter>,
    pub delay: Option<FeedbackDelay>,
    pub reverb: Option<Reverb>,
    pub distortion: Option<Distortion>,
    pub phaser: Option<Phaser>,
    pub channel_senders: HashMap<EffectType, Gain>,
    pub params: EffectParams,
    pub active_effects: Vec<EffectType>,
    /// Sample time of the last auto-filter start
    pub last_auto_filter_start_time: u64,
    pub routing: Option<RoutingPlan>,
    pub destination_volume_db: f32,
    output: OutputConfig,
    sample_rate: f32,
}

impl EffectsContext {
    pub fn new(params: EffectParams, output: OutputConfig, sample_rate: f32) -> Self {
        Self {
            effects_bus: None,
            auto_filter: None,
            delay: None,
            reverb: None,
            distortion: None,
            phaser: None,
            channel_senders: HashMap::new(),
            params: params.clamped(),
            active_effects: Vec::new(),
            last_auto_filter_start_time: 0,
            routing: None,
            destination_volume_db: 0.0,
            output,
            sample_rate,
        }
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Re-rate the context and every effect that exists
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for effect in EffectType::ALL {
            if let Some(node) = self.node_mut(effect) {
                node.set_sample_rate(sample_rate);
            }
        }
        for sender in self.channel_senders.values_mut() {
            sender.set_sample_rate(sample_rate);
        }
    }

    pub fn has_effect(&self, effect: EffectType) -> bool {
        match effect {
            EffectType::AutoFilter => self.auto_filter.is_some(),
            EffectType::Delay => self.delay.is_some(),
            EffectType::Reverb => self.reverb.is_some(),
            EffectType::Distortion => self.distortion.is_some(),
            EffectType::Phaser => self.phaser.is_some(),
        }
    }

    pub fn is_active(&self, effect: EffectType) -> bool {
        self.active_effects.contains(&effect)
    }

    /// Build the bus, every effect from the stored parameters and one sender per effect
    pub fn create_effects(&mut self) {
        let sr = self.sample_rate;
        let p = &self.params;

        info!("Creating effects bus \"{}\"", self.output.effects_bus);
        self.effects_bus = Some(Gain::unity());

        self.auto_filter = Some(AutoFilter::new(
            p.filter.frequency,
            p.filter.depth,
            p.filter.base_frequency,
            p.filter.octaves,
            p.filter.resonance,
            p.filter.wet,
            sr,
        ));
        self.delay = Some(FeedbackDelay::new(
            p.delay.delay_time,
            p.delay.feedback,
            p.delay.wet,
            sr,
        ));
        self.reverb = Some(Reverb::new(p.reverb.decay, p.reverb.pre_delay, p.reverb.wet, sr));

        let mut distortion =
            Distortion::new(p.distortion.distortion, p.distortion.wet, p.distortion.oversample, sr);
        distortion.set_tone(p.distortion.tone);
        distortion.set_level(p.distortion.level);
        self.distortion = Some(distortion);

        self.phaser = Some(Phaser::new(
            p.phaser.rate,
            p.phaser.depth,
            p.phaser.feedback,
            p.phaser.wet,
            sr,
        ));
        debug!("Effects created with {:?}", self.params);

        self.channel_senders = EffectType::ALL
            .iter()
            .map(|&effect| (effect, Gain::unity()))
            .collect();
    }

    pub fn dispose_effects(&mut self) {
        self.effects_bus = None;
        self.auto_filter = None;
        self.delay = None;
        self.reverb = None;
        self.distortion = None;
        self.phaser = None;
        self.channel_senders.clear();
        self.routing = None;
    }

    fn node_mut(&mut self, effect: EffectType) -> Option<&mut dyn AudioNode> {
        match effect {
            EffectType::AutoFilter => self.auto_filter.as_mut().map(|n| n as &mut dyn AudioNode),
            EffectType::Delay => self.delay.as_mut().map(|n| n as &mut dyn AudioNode),
            EffectType::Reverb => self.reverb.as_mut().map(|n| n as &mut dyn AudioNode),
            EffectType::Distortion => self.distortion.as_mut().map(|n| n as &mut dyn AudioNode),
            EffectType::Phaser => self.phaser.as_mut().map(|n| n as &mut dyn AudioNode),
        }
    }

    /// Run one stereo sample through an effect's sender and the effect itself
    pub fn process_effect(&mut self, effect: EffectType, now: u64, left: f32, right: f32) -> (f32, f32) {
        let (left, right) = match self.channel_senders.get_mut(&effect) {
            Some(sender) => sender.process_stereo(left, right),
            None => (left, right),
        };

        match self.node_mut(effect) {
            Some(node) => {
                node.tick(now);
                node.process_stereo(left, right)
            }
            None => (left, right),
        }
    }

    fn set_effect_enabled(&mut self, effect: EffectType, enabled: bool) {
        let p = &self.params;
        match effect {
            EffectType::AutoFilter => {
                if let Some(filter) = self.auto_filter.as_mut() {
                    filter.set_wet(if enabled { p.filter.wet } else { 0.0 });
                }
            }
            EffectType::Delay => {
                if let Some(delay) = self.delay.as_mut() {
                    delay.set_wet(if enabled { p.delay.wet } else { 0.0 });
                }
            }
            EffectType::Reverb => {
                if let Some(reverb) = self.reverb.as_mut() {
                    reverb.set_wet(if enabled { p.reverb.wet } else { 0.0 });
                }
            }
            EffectType::Distortion => {
                if let Some(distortion) = self.distortion.as_mut() {
                    distortion.set_amount(if enabled { p.distortion.distortion } else { 0.0 });
                }
            }
            EffectType::Phaser => {
                if let Some(phaser) = self.phaser.as_mut() {
                    phaser.set_wet(if enabled { p.phaser.wet } else { 0.0 });
                }
            }
        }
    }
}

// Apply a change to an effect that may not exist; returns whether it did
fn apply_to<T>(effect: &mut Option<T>, name: &str, apply: impl FnOnce(&mut T)) -> bool {
    match effect.as_mut() {
        Some(effect) => {
            apply(effect);
            true
        }
        None => {
            warn!("{} not available for update", name);
            false
        }
    }
}

/// Serializable view of the machine for the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsSnapshot {
    pub state: EffectsState,
    pub params: EffectParams,
    pub active_effects: Vec<EffectType>,
    pub last_auto_filter_start_time: u64,
    pub auto_filter_running: bool,
    pub restart_pending: bool,
    pub routing: Option<RoutingPlan>,
    pub destination_volume_db: f32,
}

pub struct EffectsMachine {
    state: EffectsState,
    context: EffectsContext,
    /// Sample time at which the auto-filter restart fires
    pending_restart: Option<u64>,
    now: u64,
}

impl EffectsMachine {
    pub fn new(params: EffectParams, output: OutputConfig, sample_rate: f32) -> Self {
        Self {
            state: EffectsState::Inactive,
            context: EffectsContext::new(params, output, sample_rate),
            pending_restart: None,
            now: 0,
        }
    }

    pub fn state(&self) -> EffectsState {
        self.state
    }

    pub fn context(&self) -> &EffectsContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut EffectsContext {
        &mut self.context
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn pending_restart(&self) -> Option<u64> {
        self.pending_restart
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        info!("Effects sample rate set to {} Hz", sample_rate);
        self.context.set_sample_rate(sample_rate);
    }

    fn restart_delay_samples(&self) -> u64 {
        sec_to_samples(RESTART_DELAY_SECONDS, self.context.sample_rate) as u64
    }

    /// Move the machine clock forward, firing a due auto-filter restart
    pub fn advance(&mut self, now: u64) {
        self.now = now;

        if let Some(due) = self.pending_restart {
            if now >= due {
                self.pending_restart = None;
                let start_at = now + self.restart_delay_samples();
                if let Some(filter) = self.context.auto_filter.as_mut() {
                    match filter.start(start_at) {
                        Ok(()) => info!("AutoFilter restarted at sample {}", start_at),
                        Err(e) => error!("Error restarting autoFilter: {}", e),
                    }
                }
            }
        }
    }

    /// Handle one event. Returns false when the current state ignores it.
    pub fn send(&mut self, event: EffectsEvent) -> bool {
        match (self.state, event) {
            (EffectsState::Inactive, EffectsEvent::InitEffects) => {
                self.init_effects();
                true
            }
            (EffectsState::Active, EffectsEvent::DisposeEffects) => {
                self.dispose_effects();
                true
            }
            (EffectsState::Active, EffectsEvent::ToggleEffect { effect, enabled }) => {
                self.toggle_effect(effect, enabled);
                true
            }
            (EffectsState::Active, event @ EffectsEvent::InitEffects) => {
                debug!("Ignoring {:?} while active", event);
                false
            }
            (EffectsState::Active, event) => {
                self.update_parameter(event);
                true
            }
            (EffectsState::Inactive, event) => {
                debug!("Ignoring {:?} while inactive", event);
                false
            }
        }
    }

    fn init_effects(&mut self) {
        let now = self.now;
        self.context.create_effects();
        self.context.destination_volume_db = self.context.output.destination_volume_db;

        let start_at = now + self.restart_delay_samples();
        if let Some(filter) = self.context.auto_filter.as_mut() {
            if let Err(e) = filter.start(start_at) {
                error!("Error starting autoFilter: {}", e);
            }
        }

        self.context.active_effects = EffectType::ALL.to_vec();
        self.context.last_auto_filter_start_time = now;
        self.state = EffectsState::Active;
        info!("Effects initialized, auto-filter starts at sample {}", start_at);

        ensure_audio_routing(&mut self.context);
    }

    fn dispose_effects(&mut self) {
        if let Some(filter) = self.context.auto_filter.as_mut() {
            if let Err(e) = filter.stop() {
                debug!("No need to stop autoFilter: {}", e);
            }
        }
        self.pending_restart = None;

        self.context.dispose_effects();
        self.context.active_effects.clear();
        self.context.last_auto_filter_start_time = 0;
        self.state = EffectsState::Inactive;
        info!("Effects disposed");
    }

    /// Stop the auto-filter now and schedule one restart after a short delay
    fn safely_restart_auto_filter(&mut self) {
        let Some(filter) = self.context.auto_filter.as_mut() else {
            return;
        };

        if self.pending_restart.take().is_some() {
            debug!("Cancelled pending autoFilter restart");
        }

        match filter.stop() {
            Ok(()) => debug!("AutoFilter stopped"),
            Err(e) => debug!("AutoFilter was not running: {}", e),
        }

        self.pending_restart = Some(self.now + self.restart_delay_samples());
    }

    fn toggle_effect(&mut self, effect: EffectType, enabled: bool) {
        let was_active = self.context.is_active(effect);

        if enabled && !was_active {
            info!("Enabling effect: {}", effect);
            self.context.active_effects.push(effect);
            self.context.set_effect_enabled(effect, true);
        } else if !enabled && was_active {
            info!("Disabling effect: {}", effect);
            self.context.active_effects.retain(|&e| e != effect);
            self.context.set_effect_enabled(effect, false);
        } else {
            debug!("Effect {} already {}", effect, if enabled { "enabled" } else { "disabled" });
        }

        ensure_audio_routing(&mut self.context);
    }

    fn update_parameter(&mut self, event: EffectsEvent) {
        let ctx = &mut self.context;
        let mut restart_filter = false;

        let applied = match event {
            EffectsEvent::UpdateFilterFrequency { frequency } => {
                let value = ranges::FILTER_FREQUENCY.clamp(frequency);
                ctx.params.filter.frequency = value;
                restart_filter = true;
                apply_to(&mut ctx.auto_filter, "Auto-filter", |f| f.set_frequency(value))
            }
            EffectsEvent::UpdateFilterDepth { depth } => {
                let value = ranges::FILTER_DEPTH.clamp(depth);
                ctx.params.filter.depth = value;
                restart_filter = true;
                apply_to(&mut ctx.auto_filter, "Auto-filter", |f| f.set_depth(value))
            }
            EffectsEvent::UpdateFilterWet { wet } => {
                let value = ranges::WET.clamp(wet);
                ctx.params.filter.wet = value;
                let enabled = ctx.is_active(EffectType::AutoFilter);
                apply_to(&mut ctx.auto_filter, "Auto-filter", |f| {
                    if enabled {
                        f.set_wet(value)
                    }
                })
            }
            EffectsEvent::UpdateFilterResonance { resonance } => {
                let value = ranges::FILTER_Q.clamp(resonance);
                ctx.params.filter.resonance = value;
                apply_to(&mut ctx.auto_filter, "Auto-filter", |f| f.set_resonance(value))
            }
            EffectsEvent::UpdateDelayTime { delay_time } => {
                let value = ranges::DELAY_TIME.clamp(delay_time);
                ctx.params.delay.delay_time = value;
                apply_to(&mut ctx.delay, "Delay effect", |d| d.set_delay_time(value))
            }
            EffectsEvent::UpdateDelayFeedback { feedback } => {
                let value = ranges::FEEDBACK.clamp(feedback);
                ctx.params.delay.feedback = value;
                apply_to(&mut ctx.delay, "Delay effect", |d| d.set_feedback(value))
            }
            EffectsEvent::UpdateDelayWet { wet } => {
                let value = ranges::WET.clamp(wet);
                ctx.params.delay.wet = value;
                let enabled = ctx.is_active(EffectType::Delay);
                apply_to(&mut ctx.delay, "Delay effect", |d| {
                    if enabled {
                        d.set_wet(value)
                    }
                })
            }
            EffectsEvent::UpdateReverbDecay { decay } => {
                let value = ranges::REVERB_DECAY.clamp(decay);
                ctx.params.reverb.decay = value;
                apply_to(&mut ctx.reverb, "Reverb effect", |r| r.set_decay(value))
            }
            EffectsEvent::UpdateReverbPreDelay { pre_delay } => {
                let value = ranges::REVERB_PRE_DELAY.clamp(pre_delay);
                ctx.params.reverb.pre_delay = value;
                apply_to(&mut ctx.reverb, "Reverb effect", |r| r.set_pre_delay(value))
            }
            EffectsEvent::UpdateReverbWet { wet } => {
                let value = ranges::WET.clamp(wet);
                ctx.params.reverb.wet = value;
                let enabled = ctx.is_active(EffectType::Reverb);
                apply_to(&mut ctx.reverb, "Reverb effect", |r| {
                    if enabled {
                        r.set_wet(value)
                    }
                })
            }
            EffectsEvent::UpdateDistortionAmount { distortion } => {
                let value = ranges::DISTORTION.clamp(distortion);
                ctx.params.distortion.distortion = value;
                let enabled = ctx.is_active(EffectType::Distortion);
                apply_to(&mut ctx.distortion, "Distortion effect", |d| {
                    if enabled {
                        d.set_amount(value)
                    }
                })
            }
            EffectsEvent::UpdateDistortionWet { wet } => {
                let value = ranges::WET.clamp(wet);
                ctx.params.distortion.wet = value;
                apply_to(&mut ctx.distortion, "Distortion effect", |d| d.set_wet(value))
            }
            EffectsEvent::UpdateDistortionTone { tone } => {
                let value = ranges::PERCENT.clamp(tone);
                ctx.params.distortion.tone = value;
                apply_to(&mut ctx.distortion, "Distortion effect", |d| d.set_tone(value))
            }
            EffectsEvent::UpdateDistortionLevel { level } => {
                let value = ranges::PERCENT.clamp(level);
                ctx.params.distortion.level = value;
                apply_to(&mut ctx.distortion, "Distortion effect", |d| d.set_level(value))
            }
            EffectsEvent::UpdatePhaserRate { rate } => {
                let value = ranges::PHASER_RATE.clamp(rate);
                ctx.params.phaser.rate = value;
                apply_to(&mut ctx.phaser, "Phaser effect", |p| p.set_rate(value))
            }
            EffectsEvent::UpdatePhaserDepth { depth } => {
                let value = ranges::PHASER_DEPTH.clamp(depth);
                ctx.params.phaser.depth = value;
                apply_to(&mut ctx.phaser, "Phaser effect", |p| p.set_depth(value))
            }
            EffectsEvent::UpdatePhaserFeedback { feedback } => {
                let value = ranges::FEEDBACK.clamp(feedback);
                ctx.params.phaser.feedback = value;
                apply_to(&mut ctx.phaser, "Phaser effect", |p| p.set_feedback(value))
            }
            EffectsEvent::UpdatePhaserWet { wet } => {
                let value = ranges::WET.clamp(wet);
                ctx.params.phaser.wet = value;
                let enabled = ctx.is_active(EffectType::Phaser);
                apply_to(&mut ctx.phaser, "Phaser effect", |p| {
                    if enabled {
                        p.set_wet(value)
                    }
                })
            }
            EffectsEvent::InitEffects
            | EffectsEvent::DisposeEffects
            | EffectsEvent::ToggleEffect { .. } => {
                error!("{:?} is not a parameter update", event);
                false
            }
        };

        if applied {
            debug!("Applied {:?}", event);
            if restart_filter {
                self.safely_restart_auto_filter();
            }
            ensure_audio_routing(&mut self.context);
        }
    }

    pub fn auto_filter_state(&self) -> Option<LfoState> {
        self.context.auto_filter.as_ref().map(|f| f.lfo_state())
    }

    pub fn snapshot(&self) -> EffectsSnapshot {
        EffectsSnapshot {
            state: self.state,
            params: self.context.params.clone(),
            active_effects: self.context.active_effects.clone(),
            last_auto_filter_start_time: self.context.last_auto_filter_start_time,
            auto_filter_running: self
                .context
                .auto_filter
                .as_ref()
                .is_some_and(|f| f.is_running()),
            restart_pending: self.pending_restart.is_some(),
            routing: self.context.routing.clone(),
            destination_volume_db: self.context.destination_volume_db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthConfig;

    const SR: f32 = 44100.0;
    const RESTART: u64 = 4410;

    fn machine() -> EffectsMachine {
        let config = SynthConfig::default();
        EffectsMachine::new(config.effects, config.output, SR)
    }

    fn active_machine(now: u64) -> EffectsMachine {
        let mut machine = machine();
        machine.advance(now);
        assert!(machine.send(EffectsEvent::InitEffects));
        machine
    }

    #[test]
    fn test_updates_are_ignored_while_inactive() {
        let mut machine = machine();
        assert_eq!(machine.state(), EffectsState::Inactive);
        assert!(!machine.send(EffectsEvent::UpdateDelayTime { delay_time: 0.5 }));
        assert!(!machine.send(EffectsEvent::DisposeEffects));
        assert_eq!(machine.context().params.delay.delay_time, 0.25);
        assert_eq!(machine.context().destination_volume_db, 0.0);
    }

    #[test]
    fn test_init_creates_everything() {
        let machine = active_machine(1000);
        let ctx = machine.context();

        assert_eq!(machine.state(), EffectsState::Active);
        for effect in EffectType::ALL {
            assert!(ctx.has_effect(effect), "{} missing", effect);
            assert!(ctx.channel_senders.contains_key(&effect));
        }
        assert!(ctx.effects_bus.is_some());
        assert_eq!(ctx.active_effects, EffectType::ALL.to_vec());
        assert_eq!(ctx.last_auto_filter_start_time, 1000);
        assert_eq!(ctx.destination_volume_db, -6.0);
        assert_eq!(machine.auto_filter_state(), Some(LfoState::Scheduled(1000 + RESTART)));
        assert!(ctx.routing.is_some(), "entering active ensures routing");
    }

    #[test]
    fn test_init_while_active_is_ignored() {
        let mut machine = active_machine(0);
        assert!(!machine.send(EffectsEvent::InitEffects));
        assert_eq!(machine.state(), EffectsState::Active);
    }

    #[test]
    fn test_dispose_keeps_parameters() {
        let mut machine = active_machine(0);
        machine.send(EffectsEvent::UpdateReverbWet { wet: 0.8 });
        assert!(machine.send(EffectsEvent::DisposeEffects));

        let ctx = machine.context();
        assert_eq!(machine.state(), EffectsState::Inactive);
        for effect in EffectType::ALL {
            assert!(!ctx.has_effect(effect));
        }
        assert!(ctx.effects_bus.is_none());
        assert!(ctx.channel_senders.is_empty());
        assert!(ctx.active_effects.is_empty());
        assert!(ctx.routing.is_none());
        assert_eq!(ctx.last_auto_filter_start_time, 0);
        assert_eq!(ctx.params.reverb.wet, 0.8);
        assert_eq!(ctx.destination_volume_db, -6.0);

        // Re-init uses the remembered values
        machine.send(EffectsEvent::InitEffects);
        assert_eq!(machine.context().reverb.as_ref().unwrap().wet(), 0.8);
    }

    #[test]
    fn test_dispose_with_stopped_filter_does_not_fail() {
        let mut machine = active_machine(0);
        machine.send(EffectsEvent::UpdateFilterDepth { depth: 0.2 });
        assert_eq!(machine.auto_filter_state(), Some(LfoState::Stopped));
        assert!(machine.send(EffectsEvent::DisposeEffects));
        assert_eq!(machine.pending_restart(), None);
    }

    #[test]
    fn test_filter_change_restarts_lfo_after_delay() {
        let mut machine = active_machine(1000);
        machine.send(EffectsEvent::UpdateFilterFrequency { frequency: 2.0 });

        assert_eq!(machine.auto_filter_state(), Some(LfoState::Stopped));
        assert_eq!(machine.pending_restart(), Some(1000 + RESTART));
        assert_eq!(machine.context().auto_filter.as_ref().unwrap().frequency(), 2.0);

        machine.advance(1000 + RESTART - 1);
        assert_eq!(machine.auto_filter_state(), Some(LfoState::Stopped));

        machine.advance(1000 + RESTART);
        assert_eq!(machine.pending_restart(), None);
        assert_eq!(
            machine.auto_filter_state(),
            Some(LfoState::Scheduled(1000 + 2 * RESTART))
        );
        // Only InitEffects records the start time
        assert_eq!(machine.context().last_auto_filter_start_time, 1000);
    }

    #[test]
    fn test_sample_rate_change_reaches_effects() {
        let mut machine = active_machine(0);
        machine.set_sample_rate(48000.0);
        assert_eq!(machine.context().sample_rate(), 48000.0);

        // The restart delay is 0.1s at the new rate
        machine.send(EffectsEvent::UpdateFilterDepth { depth: 0.5 });
        assert_eq!(machine.pending_restart(), Some(4800));

        // Effects created later use the new rate too
        machine.send(EffectsEvent::DisposeEffects);
        machine.send(EffectsEvent::InitEffects);
        machine.send(EffectsEvent::UpdateFilterFrequency { frequency: 3.0 });
        assert_eq!(machine.pending_restart(), Some(4800));
    }

    #[test]
    fn test_only_one_restart_is_pending() {
        let mut machine = active_machine(0);
        machine.send(EffectsEvent::UpdateFilterFrequency { frequency: 2.0 });
        machine.advance(2000);
        machine.send(EffectsEvent::UpdateFilterDepth { depth: 0.9 });

        // The second change replaces the first timer
        assert_eq!(machine.pending_restart(), Some(2000 + RESTART));
        machine.advance(RESTART);
        assert_eq!(machine.auto_filter_state(), Some(LfoState::Stopped));
        machine.advance(2000 + RESTART);
        assert_eq!(
            machine.auto_filter_state(),
            Some(LfoState::Scheduled(2000 + 2 * RESTART))
        );
    }

    #[test]
    fn test_update_without_effect_still_stores_value() {
        let mut machine = active_machine(0);
        machine.context_mut().delay = None;
        machine.context_mut().routing = None;

        assert!(machine.send(EffectsEvent::UpdateDelayTime { delay_time: 0.5 }));
        assert_eq!(machine.context().params.delay.delay_time, 0.5);
        // Nothing was applied, so routing was not rebuilt
        assert!(machine.context().routing.is_none());
    }

    #[test]
    fn test_filter_update_without_filter_does_not_schedule_restart() {
        let mut machine = active_machine(0);
        machine.context_mut().auto_filter = None;
        machine.send(EffectsEvent::UpdateFilterFrequency { frequency: 3.0 });
        assert_eq!(machine.context().params.filter.frequency, 3.0);
        assert_eq!(machine.pending_restart(), None);
    }

    #[test]
    fn test_updates_are_clamped() {
        let mut machine = active_machine(0);
        machine.send(EffectsEvent::UpdateDelayFeedback { feedback: 5.0 });
        machine.send(EffectsEvent::UpdateFilterResonance { resonance: 0.0 });
        machine.send(EffectsEvent::UpdateDistortionTone { tone: 150.0 });

        let ctx = machine.context();
        assert_eq!(ctx.params.delay.feedback, 0.9);
        assert_eq!(ctx.delay.as_ref().unwrap().feedback(), 0.9);
        assert_eq!(ctx.params.filter.resonance, 0.1);
        assert_eq!(ctx.auto_filter.as_ref().unwrap().resonance(), 0.1);
        assert_eq!(ctx.params.distortion.tone, 100.0);
    }

    #[test]
    fn test_toggle_off_and_on_restores_wet() {
        let mut machine = active_machine(0);

        machine.send(EffectsEvent::ToggleEffect { effect: EffectType::Reverb, enabled: false });
        assert!(!machine.context().is_active(EffectType::Reverb));
        assert_eq!(machine.context().reverb.as_ref().unwrap().wet(), 0.0);
        assert_eq!(machine.context().params.reverb.wet, 0.3);

        // Toggling to the current state changes nothing
        machine.send(EffectsEvent::ToggleEffect { effect: EffectType::Reverb, enabled: false });
        assert_eq!(machine.context().active_effects.len(), 4);

        machine.send(EffectsEvent::ToggleEffect { effect: EffectType::Reverb, enabled: true });
        assert!(machine.context().is_active(EffectType::Reverb));
        assert_eq!(machine.context().reverb.as_ref().unwrap().wet(), 0.3);
        assert_eq!(machine.context().active_effects.last(), Some(&EffectType::Reverb));
    }

    #[test]
    fn test_toggle_distortion_uses_amount() {
        let mut machine = active_machine(0);
        machine.send(EffectsEvent::ToggleEffect { effect: EffectType::Distortion, enabled: false });
        let distortion = machine.context().distortion.as_ref().unwrap();
        assert_eq!(distortion.amount(), 0.0);
        assert_eq!(distortion.wet(), 0.5);

        machine.send(EffectsEvent::ToggleEffect { effect: EffectType::Distortion, enabled: true });
        assert_eq!(machine.context().distortion.as_ref().unwrap().amount(), 0.4);
    }

    #[test]
    fn test_wet_change_on_disabled_effect_applies_on_enable() {
        let mut machine = active_machine(0);
        machine.send(EffectsEvent::ToggleEffect { effect: EffectType::Delay, enabled: false });
        machine.send(EffectsEvent::UpdateDelayWet { wet: 0.7 });

        assert_eq!(machine.context().params.delay.wet, 0.7);
        assert_eq!(machine.context().delay.as_ref().unwrap().wet(), 0.0);

        machine.send(EffectsEvent::ToggleEffect { effect: EffectType::Delay, enabled: true });
        assert_eq!(machine.context().delay.as_ref().unwrap().wet(), 0.7);
    }

    #[test]
    fn test_event_json_format() {
        let event: EffectsEvent =
            serde_json::from_str(r#"{ "type": "UPDATE_DELAY_TIME", "delayTime": 0.5 }"#).unwrap();
        assert_eq!(event, EffectsEvent::UpdateDelayTime { delay_time: 0.5 });

        let event: EffectsEvent =
            serde_json::from_str(r#"{ "type": "UPDATE_REVERB_PREDELAY", "preDelay": 0.2 }"#)
                .unwrap();
        assert_eq!(event, EffectsEvent::UpdateReverbPreDelay { pre_delay: 0.2 });

        let event: EffectsEvent = serde_json::from_str(
            r#"{ "type": "TOGGLE_EFFECT", "effect": "autoFilter", "enabled": false }"#,
        )
        .unwrap();
        assert_eq!(
            event,
            EffectsEvent::ToggleEffect { effect: EffectType::AutoFilter, enabled: false }
        );
    }

    #[test]
    fn test_snapshot_serializes() {
        let machine = active_machine(0);
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, EffectsState::Active);
        assert!(!snapshot.auto_filter_running);

        let json = serde_json::to_string(&snapshot).unwrap();
        println!("{}", json);
        assert!(json.contains("\"state\":\"active\""));
        assert!(json.contains("\"activeEffects\":[\"autoFilter\""));
        assert!(json.contains("\"filterDrive\""));
    }
}
