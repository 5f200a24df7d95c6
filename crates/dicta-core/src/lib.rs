pub mod audio;
pub mod config;
pub mod coordinator;
pub mod gesture;
pub mod persona;
pub mod pipeline;
pub mod rewrite;
pub mod sanitize;
pub mod session;
pub mod settings;
pub mod transcribe;
pub mod visualizer;

pub use audio::{FinalizedRecording, RecorderHandle};
pub use config::ApiConfig;
pub use coordinator::{
    FeedbackSink, InjectionCoordinator, InjectionError, InjectionOutcome, RejectReason,
    TextInjector,
};
pub use gesture::{GestureDetector, GestureSignal, HookKey, KeyEvent, KeyKind};
pub use persona::Persona;
pub use pipeline::{PipelineConfig, TranscriptPipeline, TranscriptResult};
pub use rewrite::{HttpRewriter, LlmConfig, LlmShape, TextRewriter};
pub use sanitize::sanitize;
pub use session::{SessionPhase, SessionTracker};
pub use settings::Settings;
pub use transcribe::{HttpTranscriber, SpeechToText, SttConfig};
pub use visualizer::Visualizer;
