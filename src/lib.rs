//! beacon-desk - desk voice assistant with a clock/weather idle view
//!
//! This library provides the pieces of the assistant:
//! - Display probing across candidate wirings, with a headless fallback
//! - Idle view upkeep (clock and cached weather)
//! - The interaction pipeline (listen, transcribe, reply, speak)
//! - Bounded conversation history
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Session                         │
//! │     triggers  │  idle monitor  │  display  │ history │
//! └────────────────────┬────────────────────────────────┘
//!                      │ one turn at a time
//! ┌────────────────────▼────────────────────────────────┐
//! │                Interaction Pipeline                  │
//! │   capture  │  STT  │  chat completion  │  TTS  │ play│
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        Providers (OpenAI, Deepgram, ElevenLabs,      │
//! │                 OpenWeatherMap)                      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod daemon;
pub mod display;
pub mod error;
pub mod hardware;
pub mod history;
pub mod idle;
pub mod input;
pub mod llm;
pub mod net;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod voice;
pub mod weather;

pub use config::Config;
pub use daemon::Daemon;
pub use display::{Display, HeadlessDisplay};
pub use error::{Error, Result};
pub use hardware::{ProbeOutcome, WiringProfile, select_wiring};
pub use history::{ConversationTurn, Role, TurnHistory};
pub use idle::{IdleMonitor, IdleSnapshot};
pub use input::{Trigger, TriggerSource};
pub use pipeline::{InteractionPipeline, PipelineState, TurnOutcome, TurnReport};
pub use session::{Session, StepKind};
