use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::dynamics::{Gain, Limiter};
use crate::audio::effects::EffectType;
use crate::audio::machine::EffectsContext;
use crate::audio::{db_to_gain, AudioNode};
use crate::config::OutputConfig;

/// The three parallel paths fed by the effects bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PathKind {
    FilterDrive,
    Delay,
    Reverb,
}

impl PathKind {
    pub const ALL: [PathKind; 3] = [PathKind::FilterDrive, PathKind::Delay, PathKind::Reverb];

    /// Effects this path runs through, in signal order
    pub fn chain_order(&self) -> &'static [EffectType] {
        match self {
            PathKind::FilterDrive => &[
                EffectType::AutoFilter,
                EffectType::Distortion,
                EffectType::Phaser,
            ],
            PathKind::Delay => &[EffectType::Delay],
            PathKind::Reverb => &[EffectType::Reverb],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum NodeId {
    Instrument,
    EffectsBus,
    Path(PathKind),
    Effect(EffectType),
    FinalBus,
    PreGain,
    Limiter,
    Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPath {
    pub kind: PathKind,
    /// Existing effects, in signal order
    pub effects: Vec<EffectType>,
    /// The subset of `effects` the instrument splitter feeds
    pub active_effects: Vec<EffectType>,
}

impl SignalPath {
    /// A path with no effects connects straight to the final bus
    pub fn is_direct(&self) -> bool {
        self.effects.is_empty()
    }

    /// Whether the instrument reaches this path at all
    pub fn is_fed(&self) -> bool {
        !self.active_effects.is_empty()
    }
}

/// A complete description of the effects graph. Rebuilt from scratch on
/// every change and swapped in whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingPlan {
    pub paths: Vec<SignalPath>,
    pub final_gain: f32,
    pub pre_gain: f32,
    pub limiter_threshold_db: f32,
}

impl RoutingPlan {
    pub fn build(context: &EffectsContext) -> Self {
        let paths = PathKind::ALL
            .iter()
            .map(|&kind| {
                let effects: Vec<EffectType> = kind
                    .chain_order()
                    .iter()
                    .copied()
                    .filter(|&effect| context.has_effect(effect))
                    .collect();
                let active_effects = effects
                    .iter()
                    .copied()
                    .filter(|&effect| context.is_active(effect))
                    .collect();
                SignalPath {
                    kind,
                    effects,
                    active_effects,
                }
            })
            .collect();

        let output = context.output();
        Self {
            paths,
            final_gain: output.final_gain,
            pre_gain: output.pre_gain,
            limiter_threshold_db: output.limiter_threshold_db,
        }
    }

    pub fn path(&self, kind: PathKind) -> Option<&SignalPath> {
        self.paths.iter().find(|path| path.kind == kind)
    }

    /// Every edge of the graph, from the effects bus to the destination
    pub fn connections(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = vec![
            (NodeId::FinalBus, NodeId::PreGain),
            (NodeId::PreGain, NodeId::Limiter),
            (NodeId::Limiter, NodeId::Destination),
        ];

        for path in &self.paths {
            let mut previous = NodeId::Path(path.kind);
            edges.push((NodeId::EffectsBus, previous));
            for &effect in &path.effects {
                edges.push((previous, NodeId::Effect(effect)));
                previous = NodeId::Effect(effect);
            }
            edges.push((previous, NodeId::FinalBus));
        }

        edges
    }
}

/// Where the keyboard voice is connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstrumentRoute {
    #[default]
    Direct,
    EffectsBus,
}

/// Disconnect everything and rebuild the graph from the effects that exist.
/// Returns false when there is no effects bus to route from.
pub fn ensure_audio_routing(context: &mut EffectsContext) -> bool {
    if context.effects_bus.is_none() {
        warn!("Effects bus not available for routing");
        return false;
    }

    let plan = RoutingPlan::build(context);
    for path in &plan.paths {
        if path.is_direct() {
            debug!("Connected {:?} path directly to the final bus", path.kind);
        } else {
            debug!("Connected {:?} path through {:?}", path.kind, path.effects);
        }
    }
    info!(
        "Rebuilt effects routing: {} connections with shared limiter at {} dB",
        plan.connections().len(),
        plan.limiter_threshold_db
    );

    context.routing = Some(plan);
    true
}

/// Connect the instrument to the effects: through the bus when any existing
/// effect is active, straight to the destination otherwise.
pub fn connect_instrument(context: &mut EffectsContext) -> InstrumentRoute {
    let route = if context.effects_bus.is_none() {
        debug!("No effects bus, instrument goes straight to the destination");
        InstrumentRoute::Direct
    } else if context
        .active_effects
        .iter()
        .any(|&effect| context.has_effect(effect))
    {
        InstrumentRoute::EffectsBus
    } else {
        debug!("No active effects, instrument goes straight to the destination");
        InstrumentRoute::Direct
    };

    ensure_audio_routing(context);
    route
}

/// Renders audio by following the current routing plan.
///
/// The output stage nodes live here rather than in the plan so the limiter
/// keeps its envelope across rebuilds.
pub struct EffectsChain {
    final_bus: Gain,
    pre_gain: Gain,
    limiter: Limiter,
    destination: Gain,
    destination_db: f32,
}

impl EffectsChain {
    pub fn new(output: &OutputConfig, sample_rate: f32) -> Self {
        Self {
            final_bus: Gain::new(output.final_gain),
            pre_gain: Gain::new(output.pre_gain),
            limiter: Limiter::new(output.limiter_threshold_db, sample_rate),
            destination: Gain::unity(),
            destination_db: 0.0,
        }
    }

    pub fn render(
        &mut self,
        context: &mut EffectsContext,
        route: InstrumentRoute,
        now: u64,
        left: f32,
        right: f32,
    ) -> (f32, f32) {
        if context.destination_volume_db != self.destination_db {
            self.destination_db = context.destination_volume_db;
            self.destination.set_gain(db_to_gain(self.destination_db));
        }

        let (left, right) = match route {
            InstrumentRoute::EffectsBus => match context.routing.take() {
                Some(plan) => {
                    let out = self.render_plan(context, &plan, now, left, right);
                    context.routing = Some(plan);
                    out
                }
                None => (left, right),
            },
            InstrumentRoute::Direct => (left, right),
        };

        self.destination.process_stereo(left, right)
    }

    fn render_plan(
        &mut self,
        context: &mut EffectsContext,
        plan: &RoutingPlan,
        now: u64,
        left: f32,
        right: f32,
    ) -> (f32, f32) {
        let (bus_left, bus_right) = match context.effects_bus.as_mut() {
            Some(bus) => bus.process_stereo(left, right),
            None => return (left, right),
        };

        let mut sum_left = 0.0;
        let mut sum_right = 0.0;
        // Only active effects receive the instrument; inactive ones are skipped
        for path in plan.paths.iter().filter(|path| path.is_fed()) {
            let (mut path_left, mut path_right) = (bus_left, bus_right);
            for &effect in &path.active_effects {
                (path_left, path_right) = context.process_effect(effect, now, path_left, path_right);
            }
            sum_left += path_left;
            sum_right += path_right;
        }

        self.final_bus.set_gain(plan.final_gain);
        self.pre_gain.set_gain(plan.pre_gain);
        if self.limiter.threshold_db() != plan.limiter_threshold_db {
            self.limiter.set_threshold_db(plan.limiter_threshold_db);
        }

        let (l, r) = self.final_bus.process_stereo(sum_left, sum_right);
        let (l, r) = self.pre_gain.process_stereo(l, r);
        self.limiter.process_stereo(l, r)
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.limiter.set_sample_rate(sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthConfig;

    fn context_with_all_effects() -> EffectsContext {
        let config = SynthConfig::default();
        let mut context = EffectsContext::new(config.effects, config.output, 44100.0);
        context.create_effects();
        context
    }

    #[test]
    fn test_routing_without_bus_fails_and_changes_nothing() {
        let config = SynthConfig::default();
        let mut context = EffectsContext::new(config.effects, config.output, 44100.0);
        assert!(!ensure_audio_routing(&mut context));
        assert!(context.routing.is_none());
        assert_eq!(connect_instrument(&mut context), InstrumentRoute::Direct);
    }

    #[test]
    fn test_full_plan_has_three_parallel_paths() {
        let mut context = context_with_all_effects();
        assert!(ensure_audio_routing(&mut context));
        let plan = context.routing.clone().unwrap();

        assert_eq!(plan.paths.len(), 3);
        assert_eq!(
            plan.path(PathKind::FilterDrive).unwrap().effects,
            vec![EffectType::AutoFilter, EffectType::Distortion, EffectType::Phaser]
        );
        assert_eq!(plan.path(PathKind::Delay).unwrap().effects, vec![EffectType::Delay]);
        assert_eq!(plan.path(PathKind::Reverb).unwrap().effects, vec![EffectType::Reverb]);
        assert_eq!(plan.final_gain, 0.85);
        assert_eq!(plan.pre_gain, 0.89);
        assert_eq!(plan.limiter_threshold_db, -18.0);

        let edges = plan.connections();
        println!("{:?}", edges);
        assert!(edges.contains(&(NodeId::Limiter, NodeId::Destination)));
        assert!(edges.contains(&(
            NodeId::Effect(EffectType::AutoFilter),
            NodeId::Effect(EffectType::Distortion)
        )));
        assert!(edges.contains(&(NodeId::Effect(EffectType::Reverb), NodeId::FinalBus)));
    }

    #[test]
    fn test_missing_effects_are_skipped_or_bypassed() {
        let mut context = context_with_all_effects();
        context.auto_filter = None;
        context.delay = None;
        ensure_audio_routing(&mut context);
        let plan = context.routing.clone().unwrap();

        assert_eq!(
            plan.path(PathKind::FilterDrive).unwrap().effects,
            vec![EffectType::Distortion, EffectType::Phaser]
        );
        let delay_path = plan.path(PathKind::Delay).unwrap();
        assert!(delay_path.is_direct());
        assert!(plan
            .connections()
            .contains(&(NodeId::Path(PathKind::Delay), NodeId::FinalBus)));
    }

    #[test]
    fn test_instrument_goes_direct_without_active_effects() {
        let mut context = context_with_all_effects();
        assert_eq!(connect_instrument(&mut context), InstrumentRoute::Direct);

        context.active_effects.push(EffectType::Delay);
        assert_eq!(connect_instrument(&mut context), InstrumentRoute::EffectsBus);

        // An active effect that no longer exists does not count
        context.delay = None;
        assert_eq!(connect_instrument(&mut context), InstrumentRoute::Direct);
    }

    #[test]
    fn test_plan_records_active_effects_per_path() {
        let mut context = context_with_all_effects();
        context.active_effects = vec![EffectType::Phaser, EffectType::Reverb];
        ensure_audio_routing(&mut context);
        let plan = context.routing.clone().unwrap();

        let filter_drive = plan.path(PathKind::FilterDrive).unwrap();
        assert_eq!(filter_drive.active_effects, vec![EffectType::Phaser]);
        assert!(filter_drive.is_fed());
        assert!(!plan.path(PathKind::Delay).unwrap().is_fed());
        assert_eq!(
            plan.path(PathKind::Reverb).unwrap().active_effects,
            vec![EffectType::Reverb]
        );
    }

    #[test]
    fn test_single_active_effect_matches_its_own_path() {
        let mut context = context_with_all_effects();
        context.active_effects = vec![EffectType::Reverb];
        if let Some(reverb) = context.reverb.as_mut() {
            reverb.set_wet(0.0);
        }
        assert_eq!(connect_instrument(&mut context), InstrumentRoute::EffectsBus);

        let mut chain = EffectsChain::new(context.output(), 44100.0);
        let mut out = (0.0, 0.0);
        for now in 0..4410u64 {
            out = chain.render(&mut context, InstrumentRoute::EffectsBus, now, 0.01, 0.01);
        }

        // Dry reverb path through final bus and pre-gain, well under the limiter
        let expected = 0.01 * 0.85 * 0.89;
        println!("Single path output {:.6}, expected {:.6}", out.0, expected);
        assert!((out.0 - expected).abs() < 1e-6);
        assert!((out.1 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_inactive_effect_in_a_chain_is_skipped() {
        let mut context = context_with_all_effects();
        context.active_effects = vec![EffectType::Distortion];
        if let Some(filter) = context.auto_filter.as_mut() {
            filter.set_wet(1.0);
        }
        if let Some(distortion) = context.distortion.as_mut() {
            distortion.set_wet(0.0);
        }
        ensure_audio_routing(&mut context);

        // The fully wet auto-filter would colour the signal if it were run
        let mut chain = EffectsChain::new(context.output(), 44100.0);
        let (l, _) = chain.render(&mut context, InstrumentRoute::EffectsBus, 0, 0.01, 0.01);
        assert!((l - 0.01 * 0.85 * 0.89).abs() < 1e-6);
    }

    #[test]
    fn test_chain_output_is_limited() {
        let mut context = context_with_all_effects();
        context.active_effects = EffectType::ALL.to_vec();
        ensure_audio_routing(&mut context);
        let mut chain = EffectsChain::new(context.output(), 44100.0);
        let threshold = db_to_gain(-18.0);

        let mut peak = 0.0f32;
        for now in 0..44100u64 {
            let x = if (now / 50) % 2 == 0 { 1.0 } else { -1.0 };
            let (l, r) = chain.render(&mut context, InstrumentRoute::EffectsBus, now, x, x);
            assert!(l.is_finite() && r.is_finite());
            peak = peak.max(l.abs()).max(r.abs());
        }
        println!("Chain peak {:.4}, limiter threshold {:.4}", peak, threshold);
        assert!(peak > 0.0);
        assert!(peak <= threshold + 1e-5);
        assert!(context.routing.is_some(), "plan must be restored after rendering");
    }

    #[test]
    fn test_direct_route_applies_destination_volume() {
        let mut context = context_with_all_effects();
        context.destination_volume_db = -6.0;
        let mut chain = EffectsChain::new(context.output(), 44100.0);
        let (l, r) = chain.render(&mut context, InstrumentRoute::Direct, 0, 1.0, 0.5);
        assert!((l - db_to_gain(-6.0)).abs() < 1e-6);
        assert!((r - 0.5 * db_to_gain(-6.0)).abs() < 1e-6);
    }
}
