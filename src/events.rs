use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowState;

/// Notifications published by the node while it executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeEvent {
    /// The workflow moved between states.
    #[serde(rename_all = "camelCase")]
    StateChanged {
        from: WorkflowState,
        to: WorkflowState,
    },
    /// The server reported the seed it used. `seed` is the node's local seed
    /// after the reset policy ran, `output_seed` the value now on the `Seed` port.
    #[serde(rename_all = "camelCase")]
    SeedUpdated { seed: i64, output_seed: i64 },
    /// Any progress indicator tied to this generation should be dismissed.
    ProgressCleared,
}

/// Callback registered with [`Img2ImgNode::on_event`](crate::Img2ImgNode::on_event).
pub type EventListener = Box<dyn Fn(&NodeEvent) + Send + Sync>;
