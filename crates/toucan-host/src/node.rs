// crates/toucan-host/src/node.rs
//
// `ImageEffectNode` is the one `ImageNode` implementation this crate
// contributes to the graph: a plugin instance bound to 0, 1, or 2 inputs
// depending on its context (generator, filter, transition). The compiler
// (toucan-graph) constructs these; everything else about plugin dispatch
// is hidden behind `Host`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use toucan_core::node::{ImageBuf, ImageNode, ImageSpec, NodeState};
use toucan_core::{PropertySet, RationalTime, Result};

use crate::host::{populate_param_args, Host};
use crate::suites::with_render_context;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectContext {
    Generator,
    Filter,
    Transition,
}

pub struct ImageEffectNode {
    state: NodeState,
    host: Rc<RefCell<Host>>,
    plugin_index: usize,
    instance_index: usize,
    context: EffectContext,
    label: String,
    inputs: Vec<Box<dyn ImageNode>>,
    /// Metadata `"size"` override (§4.E step 2): generator output
    /// dimensions when the caller didn't inherit them from a source.
    size_override: Option<(usize, usize)>,
}

impl ImageEffectNode {
    pub fn new(
        host: Rc<RefCell<Host>>,
        plugin_index: usize,
        instance_index: usize,
        context: EffectContext,
        label: impl Into<String>,
        inputs: Vec<Box<dyn ImageNode>>,
        size_override: Option<(usize, usize)>,
    ) -> Self {
        Self {
            state: NodeState::new(),
            host,
            plugin_index,
            instance_index,
            context,
            label: label.into(),
            inputs,
            size_override,
        }
    }

    fn param_values_to_args(&self, args: &mut PropertySet) {
        if let Some(instance) = self.host.borrow().instance(self.instance_index) {
            populate_param_args(&instance.param_values, args);
        }
    }
}

impl ImageNode for ImageEffectNode {
    fn label(&self) -> &str {
        &self.label
    }

    fn inputs(&self) -> &[Box<dyn ImageNode>] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut Vec<Box<dyn ImageNode>> {
        &mut self.inputs
    }

    fn time(&self) -> RationalTime {
        self.state.time
    }

    fn set_time(&mut self, time: RationalTime) {
        self.state.time = time;
        let effective = self.state.effective_time();
        for input in &mut self.inputs {
            input.set_time(effective);
        }
    }

    fn time_offset(&self) -> RationalTime {
        self.state.time_offset
    }

    fn set_time_offset(&mut self, offset: RationalTime) {
        self.state.time_offset = offset;
    }

    fn exec(&mut self) -> Result<ImageBuf> {
        let mut clips = HashMap::new();
        match self.context {
            EffectContext::Generator => {}
            EffectContext::Filter => {
                let source = self.inputs[0].exec()?;
                clips.insert("Source".to_string(), source);
            }
            EffectContext::Transition => {
                let from = self.inputs[0].exec()?;
                let to = self.inputs[1].exec()?;
                clips.insert("SourceFrom".to_string(), from);
                clips.insert("SourceTo".to_string(), to);
            }
        }

        let (width, height) = self
            .size_override
            .or_else(|| clips.get("Source").map(|b| (b.width(), b.height())))
            .or_else(|| clips.get("SourceFrom").map(|b| (b.width(), b.height())))
            .unwrap_or((0, 0));

        let mut in_args = PropertySet::new();
        let _ = in_args.set_double("Time", 0, self.state.effective_time().to_seconds());
        let _ = in_args.set_int_n("RenderWindow", &[0, 0, width as i64, height as i64]);
        self.param_values_to_args(&mut in_args);
        let mut out_args = PropertySet::new();

        let plugin_index = self.plugin_index;
        let instance_index = self.instance_index;
        let host = Rc::clone(&self.host);
        let output_spec = ImageSpec::rgba8(width, height);
        let (render_result, output) = with_render_context(clips, output_spec, || {
            host.borrow().render(plugin_index, instance_index, &mut in_args, &mut out_args)
        });
        render_result?;

        Ok(output)
    }
}

impl std::fmt::Debug for ImageEffectNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageEffectNode")
            .field("label", &self.label)
            .field("context", &self.context)
            .finish()
    }
}

impl Drop for ImageEffectNode {
    fn drop(&mut self) {
        self.host.borrow_mut().destroy_instance(self.plugin_index, self.instance_index);
    }
}
