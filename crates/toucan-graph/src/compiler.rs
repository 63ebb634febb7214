// crates/toucan-graph/src/compiler.rs
//
// §4.G Image Graph Compiler: builds a fresh `ImageNode` tree for one query
// time. Nothing here mutates between calls — `compile` reads the timeline
// and the host's plugin table and returns a tree that, once `set_time` is
// called on its root, cascades the right media-local time to every leaf
// through `time_offset` and `LinearTimeWarpNode`. Deciding WHICH item is
// active at a given instant still needs the query time up front (track
// layout is time-dependent); the node tree itself carries only static
// offsets and scalars so a single top-level `set_time` reproduces the same
// decision at render time.

use std::cell::RefCell;
use std::rc::Rc;

use toucan_core::builtins::{CompNode, DissolveNode, FillNode, LinearTimeWarpNode};
use toucan_core::node::ImageNode;
use toucan_core::time::{RationalTime, TimeRange};
use toucan_core::timeline::{Clip, Composable, Effect, GeneratorReference, Item, Stack, Track, TrackKind, Transition};
use toucan_core::{EffectRegistry, Result};
use toucan_host::{EffectContext, Host, ImageEffectNode};
use tracing::warn;

use toucan_media::TimelineWrapper;

fn context_str(context: EffectContext) -> &'static str {
    match context {
        EffectContext::Generator => "generator",
        EffectContext::Filter => "filter",
        EffectContext::Transition => "transition",
    }
}

fn time_warp_scalar(effects: &[Effect]) -> Option<f64> {
    effects.iter().find_map(Effect::time_scalar)
}

pub struct Compiler {
    host: Rc<RefCell<Host>>,
    registry: EffectRegistry,
    image_size: (usize, usize),
}

impl Compiler {
    /// Probes the wrapper's image size once (§4.G step 1) and holds onto
    /// the host and effect registry for every subsequent `compile` call.
    pub fn new(wrapper: &TimelineWrapper, host: Rc<RefCell<Host>>, registry: EffectRegistry) -> Self {
        let image_size = wrapper.probe_image_size().unwrap_or((0, 0));
        Self { host, registry, image_size }
    }

    pub fn image_size(&self) -> (usize, usize) {
        self.image_size
    }

    /// §4.G entry point: compiles the timeline at `time` into a root node,
    /// ready for `exec()`.
    pub fn compile(&self, wrapper: &TimelineWrapper, time: RationalTime) -> Result<Box<dyn ImageNode>> {
        let t = time - wrapper.timeline().start_time();
        let mut root = self.compile_stack(wrapper, &wrapper.timeline().tracks, t)?;
        root.set_time(t);
        Ok(root)
    }

    /// Compiles one `Stack` (the timeline root, or a nested composition
    /// item) at decision time `t`, in `t`'s own coordinate space. The
    /// returned node expects `set_time(t)` (the same `t` passed in) to
    /// reproduce this exact selection at render time.
    fn compile_stack(&self, wrapper: &TimelineWrapper, stack: &Stack, t: RationalTime) -> Result<Box<dyn ImageNode>> {
        let (w, h) = self.image_size;
        let mut root: Box<dyn ImageNode> = Box::new(FillNode::new(w, h).with_color(0.0, 0.0, 0.0, 1.0));

        let stack_duration = stack.duration();
        let stack_warp = time_warp_scalar(&stack.effects);
        let t_stack = match stack_warp {
            Some(s) => warp(t, s, stack_duration),
            None => t,
        };

        for track in &stack.tracks {
            if track.kind != TrackKind::Video || !track.has_clips() {
                continue;
            }
            let Some(track_node) = self.compile_track(wrapper, track, t_stack)? else { continue };
            root = Box::new(CompNode::new(root, track_node));
        }

        let mut root = self.apply_effect_chain(&stack.effects, root)?;
        if let Some(s) = stack_warp {
            root = Box::new(LinearTimeWarpNode::new(root, s, stack_duration));
        }
        Ok(root)
    }

    /// §4.G step 4: builds one track's contribution, including any
    /// transition wrapping, or `None` if the track has no item active at
    /// `t_stack` (an empty or gap-only span at this instant).
    fn compile_track(&self, wrapper: &TimelineWrapper, track: &Track, t_stack: RationalTime) -> Result<Option<Box<dyn ImageNode>>> {
        let track_duration = track.duration();
        let track_warp = time_warp_scalar(&track.effects);
        let t2 = match track_warp {
            Some(s) => warp(t_stack, s, track_duration),
            None => t_stack,
        };

        let Some(cursor) = track.item_at(t2) else { return Ok(None) };
        let mut track_node = self.build_item(wrapper, track, &cursor.ranges, cursor.index, t2)?;

        if let Some(prev) = cursor.prev {
            if let Composable::Transition(trans) = &track.children[prev] {
                let span = cursor.ranges[prev];
                if span.contains(t2) {
                    if let Some(prev2) = cursor.prev2 {
                        let previous_node = self.build_item(wrapper, track, &cursor.ranges, prev2, t2)?;
                        track_node = self.build_transition(trans, span, previous_node, track_node)?;
                    }
                }
            }
        }
        if let Some(next) = cursor.next {
            if let Composable::Transition(trans) = &track.children[next] {
                let span = cursor.ranges[next];
                if span.contains(t2) {
                    if let Some(next2) = cursor.next2 {
                        let next_node = self.build_item(wrapper, track, &cursor.ranges, next2, t2)?;
                        track_node = self.build_transition(trans, span, track_node, next_node)?;
                    }
                }
            }
        }

        let mut track_node = self.apply_effect_chain(&track.effects, track_node)?;
        if let Some(s) = track_warp {
            track_node = Box::new(LinearTimeWarpNode::new(track_node, s, track_duration));
        }
        Ok(Some(track_node))
    }

    /// Per-item construction (§4.G "Per-item construction"). Builds the
    /// item's own content (Read/generator/Fill/nested stack), applies its
    /// image effects, and wraps the whole thing in a `LinearTimeWarpNode`
    /// carrying both the item's time-warp scalar (1.0 if it has none) and
    /// its placement offset — one wrapper covers both concerns, since an
    /// identity-scalar warp is just an offset carrier.
    fn build_item(
        &self,
        wrapper: &TimelineWrapper,
        track: &Track,
        ranges: &[TimeRange],
        idx: usize,
        t2: RationalTime,
    ) -> Result<Box<dyn ImageNode>> {
        let item = track.children[idx].as_item().expect("idx must index an Item composable");
        let range = ranges[idx];
        let rate = range.start.rate;
        let source_start = item.source_range().map(|r| r.start).unwrap_or_else(|| RationalTime::new(0.0, rate));
        let mut offset = range.start - source_start;
        let label = format!("{}:{idx}", track.name);

        let (content, item_warp, duration): (Box<dyn ImageNode>, Option<f64>, RationalTime) = match item {
            Item::Clip(clip) => {
                let built = self.build_clip_content(wrapper, clip, &label, &mut offset)?;
                let built = self.apply_effect_chain(&clip.base.effects, built)?;
                (built, time_warp_scalar(&clip.base.effects), item.available_range().duration)
            }
            Item::Gap(gap) => {
                let built: Box<dyn ImageNode> = Box::new(FillNode::new(self.image_size.0, self.image_size.1));
                let built = self.apply_effect_chain(&gap.base.effects, built)?;
                (built, time_warp_scalar(&gap.base.effects), item.available_range().duration)
            }
            Item::Stack(nested) => {
                // The nested stack already applies its own effects/warps
                // internally (compile_stack); only the placement offset
                // belongs at this level, so item_warp stays None.
                let nested_decision_t = (t2.rescaled_to(rate) - offset).rescaled_to(rate);
                let built = self.compile_stack(wrapper, nested, nested_decision_t)?;
                (built, None, nested.duration())
            }
        };

        let scalar = item_warp.unwrap_or(1.0);
        let mut warp_node = LinearTimeWarpNode::new(content, scalar, duration);
        warp_node.set_time_offset(offset);
        Ok(Box::new(warp_node))
    }

    fn build_clip_content(
        &self,
        wrapper: &TimelineWrapper,
        clip: &Clip,
        label: &str,
        offset: &mut RationalTime,
    ) -> Result<Box<dyn ImageNode>> {
        match &clip.media_reference {
            toucan_core::timeline::MediaReference::Generator(g) => Ok(self.make_generator_node(g, label)),
            _ => {
                let (node, read_range) = wrapper.make_read_node(clip, label.to_string())?;
                if let Some(avail) = clip.available_range {
                    if avail.start != read_range.start {
                        *offset = *offset + avail.start;
                    }
                }
                Ok(node)
            }
        }
    }

    /// §4.G: "ask host for a node by generator_kind with the generator's
    /// parameters as metadata". Falls back to a transparent Fill, logged,
    /// if no plugin claims the kind — the same log-and-continue policy
    /// §7 uses for decode failures.
    fn make_generator_node(&self, generator: &GeneratorReference, label: &str) -> Box<dyn ImageNode> {
        let identifier = self.registry.resolve(&generator.kind);
        let plugin_index = self.host.borrow().find_plugin(&identifier);
        let Some(plugin_index) = plugin_index else {
            warn!(kind = %generator.kind, "no plugin registered for generator, falling back to Fill");
            return Box::new(FillNode::new(self.image_size.0, self.image_size.1));
        };
        let instance = self.host.borrow_mut().create_instance(plugin_index, "generator", &generator.parameters);
        match instance {
            Ok(instance_index) => Box::new(ImageEffectNode::new(
                Rc::clone(&self.host),
                plugin_index,
                instance_index,
                EffectContext::Generator,
                label.to_string(),
                Vec::new(),
                Some(self.image_size),
            )),
            Err(e) => {
                warn!(kind = %generator.kind, error = %e, "failed to instantiate generator plugin, falling back to Fill");
                Box::new(FillNode::new(self.image_size.0, self.image_size.1))
            }
        }
    }

    /// Applies a chain of non-time-warp effects via the plugin host
    /// (§4.G: "Apply the item's image effects in order as a chain").
    /// An effect with no matching plugin is logged and skipped rather than
    /// aborting the whole graph.
    fn apply_effect_chain(&self, effects: &[Effect], mut node: Box<dyn ImageNode>) -> Result<Box<dyn ImageNode>> {
        for effect in effects {
            if effect.is_time_warp() {
                continue;
            }
            let identifier = self.registry.resolve(&effect.effect_name);
            let plugin_index = self.host.borrow().find_plugin(&identifier);
            let Some(plugin_index) = plugin_index else {
                warn!(effect = %effect.effect_name, "no plugin registered for effect, skipping");
                continue;
            };
            let instance_index = self.host.borrow_mut().create_instance(plugin_index, "filter", &effect.parameters)?;
            node = Box::new(ImageEffectNode::new(
                Rc::clone(&self.host),
                plugin_index,
                instance_index,
                EffectContext::Filter,
                effect.effect_name.clone(),
                vec![node],
                None,
            ));
        }
        Ok(node)
    }

    /// §4.G steps c/d: wraps the active track node with the transition
    /// named by `trans.transition_type`, preferring a host plugin of that
    /// identifier and falling back to the built-in `Dissolve` (§4.G: "any
    /// plugin named identically to the transition_type preempts it").
    fn build_transition(
        &self,
        trans: &Transition,
        span: TimeRange,
        from: Box<dyn ImageNode>,
        to: Box<dyn ImageNode>,
    ) -> Result<Box<dyn ImageNode>> {
        let identifier = self.registry.resolve(&trans.transition_type);
        let plugin_index = self.host.borrow().find_plugin(&identifier);
        if let Some(plugin_index) = plugin_index {
            let instance_index = self.host.borrow_mut().create_instance(plugin_index, "transition", &trans.parameters)?;
            return Ok(Box::new(ImageEffectNode::new(
                Rc::clone(&self.host),
                plugin_index,
                instance_index,
                EffectContext::Transition,
                trans.transition_type.clone(),
                vec![from, to],
                None,
            )));
        }
        Ok(Box::new(DissolveNode::new(from, to, span)))
    }
}

/// Same reflect-then-scale-then-floor rule `LinearTimeWarpNode::warp`
/// applies at render time, used here purely to decide which item is
/// active — kept in lockstep with the node so compile-time selection and
/// runtime cascade never disagree (§4.G edge case: negative scalar
/// reflects around the warped range's own duration).
fn warp(t: RationalTime, scalar: f64, duration: RationalTime) -> RationalTime {
    let rate = duration.rate;
    let t = t.rescaled_to(rate);
    if scalar < 0.0 {
        let one_tick = RationalTime::new(1.0, rate);
        let reflected = duration - one_tick - t;
        RationalTime::new(reflected.value * scalar, rate).floor()
    } else {
        RationalTime::new(t.value * scalar, rate).floor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warp_matches_positive_scalar_identity_at_one() {
        let d = RationalTime::new(48.0, 24.0);
        let t = RationalTime::new(10.0, 24.0);
        assert_eq!(warp(t, 1.0, d).value, 10.0);
    }

    #[test]
    fn warp_reflects_for_negative_scalar() {
        let d = RationalTime::new(48.0, 24.0);
        let t = RationalTime::new(0.0, 24.0);
        assert_eq!(warp(t, -1.0, d).value, -47.0);
    }
}
