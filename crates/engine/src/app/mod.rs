mod input;
mod loop_runner;
mod metrics;
mod scene;

pub use input::InputAction;
pub use loop_runner::{
    run_headless, run_headless_with_metrics, IdleInput, InputSource, LoopConfig, LoopSummary,
    ScriptedInput,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{InputSnapshot, Scene, SceneCommand};
