//! The node's port surface: what the host graph binds into it and what it
//! reads back out.

use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{ControlNetData, Prompt};

/// Input slots, addressed by their canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputPort {
    InImage,
    ControlNet,
    Mask,
    Prompt,
    Step,
    Cfg,
    DenoiseStrength,
}

impl InputPort {
    pub const ALL: [InputPort; 7] = [
        InputPort::InImage,
        InputPort::ControlNet,
        InputPort::Mask,
        InputPort::Prompt,
        InputPort::Step,
        InputPort::Cfg,
        InputPort::DenoiseStrength,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InputPort::InImage => "In Image",
            InputPort::ControlNet => "ControlNet",
            InputPort::Mask => "Mask",
            InputPort::Prompt => "Prompt",
            InputPort::Step => "Step",
            InputPort::Cfg => "CFG",
            // Name is part of the saved-graph format, typo included.
            InputPort::DenoiseStrength => "DenisoStrength",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|port| port.name() == name)
    }
}

/// Output slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputPort {
    OutImage,
    Seed,
}

impl OutputPort {
    pub const ALL: [OutputPort; 2] = [OutputPort::OutImage, OutputPort::Seed];

    pub fn name(&self) -> &'static str {
        match self {
            OutputPort::OutImage => "Out Image",
            OutputPort::Seed => "Seed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|port| port.name() == name)
    }
}

/// A value flowing through a port.
#[derive(Debug, Clone, PartialEq)]
pub enum PortValue {
    Image(Arc<RgbaImage>),
    ControlNet(ControlNetData),
    Prompt(Prompt),
    Int(i64),
    Float(f64),
}

impl PortValue {
    fn as_image(&self) -> Option<Arc<RgbaImage>> {
        match self {
            PortValue::Image(img) => Some(Arc::clone(img)),
            _ => None,
        }
    }

    fn as_control_net(&self) -> Option<ControlNetData> {
        match self {
            PortValue::ControlNet(data) => Some(data.clone()),
            _ => None,
        }
    }

    fn as_prompt(&self) -> Option<Prompt> {
        match self {
            PortValue::Prompt(prompt) => Some(prompt.clone()),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            PortValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            PortValue::Float(v) => Some(*v),
            PortValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// Values the host graph currently has wired into the node's inputs.
#[derive(Debug, Clone, Default)]
pub struct InputBindings {
    values: HashMap<InputPort, PortValue>,
}

impl InputBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value (builder pattern).
    pub fn with(mut self, port: InputPort, value: PortValue) -> Self {
        self.bind(port, value);
        self
    }

    pub fn bind(&mut self, port: InputPort, value: PortValue) {
        self.values.insert(port, value);
    }

    /// Bind by port name. Returns `false` for unknown names.
    pub fn bind_by_name(&mut self, name: &str, value: PortValue) -> bool {
        match InputPort::from_name(name) {
            Some(port) => {
                self.bind(port, value);
                true
            }
            None => false,
        }
    }

    pub fn unbind(&mut self, port: InputPort) -> Option<PortValue> {
        self.values.remove(&port)
    }

    pub fn get(&self, port: InputPort) -> Option<&PortValue> {
        self.values.get(&port)
    }

    /// Typed pull with fallback for unbound, mistyped or out-of-range ports.
    fn pull<T>(
        &self,
        port: InputPort,
        fallback: T,
        extract: impl Fn(&PortValue) -> Option<T>,
    ) -> T {
        match self.values.get(&port) {
            None => fallback,
            Some(value) => match extract(value) {
                Some(v) => v,
                None => {
                    log::warn!(
                        "Port '{}' is bound to an incompatible value, using the node field",
                        port.name()
                    );
                    fallback
                }
            },
        }
    }
}

/// The node's input fields. Also used as the per-execution snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInputs {
    pub source_image: Option<Arc<RgbaImage>>,
    pub mask_image: Option<Arc<RgbaImage>>,
    pub control_net: Option<ControlNetData>,
    pub prompt: Prompt,
    pub steps: i32,
    pub cfg: i32,
    pub denoise_strength: f32,
}

impl Default for NodeInputs {
    fn default() -> Self {
        Self {
            source_image: None,
            mask_image: None,
            control_net: None,
            prompt: Prompt::default(),
            steps: 20,
            cfg: 7,
            denoise_strength: 0.75,
        }
    }
}

impl NodeInputs {
    /// Snapshot the inputs for one execution: bound values win, unbound ports
    /// fall back to the stored fields.
    pub fn pull(&self, bindings: &InputBindings) -> NodeInputs {
        NodeInputs {
            source_image: bindings.pull(
                InputPort::InImage,
                self.source_image.clone(),
                |v| v.as_image().map(Some),
            ),
            mask_image: bindings.pull(InputPort::Mask, self.mask_image.clone(), |v| {
                v.as_image().map(Some)
            }),
            control_net: bindings.pull(
                InputPort::ControlNet,
                self.control_net.clone(),
                |v| v.as_control_net().map(Some),
            ),
            prompt: bindings.pull(InputPort::Prompt, self.prompt.clone(), PortValue::as_prompt),
            steps: bindings.pull(InputPort::Step, self.steps, |v| {
                v.as_int().and_then(|n| i32::try_from(n).ok())
            }),
            cfg: bindings.pull(InputPort::Cfg, self.cfg, |v| {
                v.as_int().and_then(|n| i32::try_from(n).ok())
            }),
            denoise_strength: bindings.pull(
                InputPort::DenoiseStrength,
                self.denoise_strength,
                |v| v.as_float().map(|f| f as f32),
            ),
        }
    }
}

/// Typed storage behind the node's output ports.
///
/// Only the workflow writes here, and only when a generation completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputStore {
    image: Option<Arc<RgbaImage>>,
    seed: i64,
}

impl OutputStore {
    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    /// Publish a finished generation. `seed` is `None` when the server did not
    /// report one, leaving the previous seed output in place.
    pub(crate) fn commit(&mut self, image: RgbaImage, seed: Option<i64>) {
        self.image = Some(Arc::new(image));
        if let Some(seed) = seed {
            self.seed = seed;
        }
    }

    pub fn value(&self, port: OutputPort) -> Option<PortValue> {
        match port {
            OutputPort::OutImage => self.image.as_ref().map(|img| PortValue::Image(Arc::clone(img))),
            OutputPort::Seed => Some(PortValue::Int(self.seed)),
        }
    }

    /// Late-bound pull used by the host graph. Unknown names yield `None`.
    pub fn request_value(&self, name: &str) -> Option<PortValue> {
        OutputPort::from_name(name).and_then(|port| self.value(port))
    }
}
