//! uisnap flow executor
//!
//! Drives a browser through scripted user journeys (register, log in,
//! create content, navigate) and saves screenshots at named checkpoints.
//! A failure inside one stage is recorded and the run moves on to the next
//! stage, so a single run yields as many captures as the application
//! allows.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      FlowRunner                             │
//! │    ├── credentials_for(flow) -> Credentials                 │
//! │    ├── template_context(flow) -> TemplateContext            │
//! │    └── run(flow) -> RunResult  (+ run-result.json)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StepSequencer                                              │
//! │    ├── stage: guarded group of steps, optional checkpoint   │
//! │    ├── Captured(path) | Failed("<Kind>: <detail>")          │
//! │    └── fallback capture error_<checkpoint>.png              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FlowDriver + StateSynchronizer                             │
//! │    ├── start / stop (always closed, exactly once)           │
//! │    └── navigate, fill, click, press, wait_for, evaluate,    │
//! │        screenshot                                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserEngine                                              │
//! │    ├── PlaywrightEngine  (Node bridge, JSON lines)          │
//! │    └── ScriptedEngine    (dry runs and tests)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod config;
pub mod content;
pub mod credentials;
pub mod driver;
pub mod engine;
pub mod error;
pub mod flow;
pub mod playwright;
pub mod preflight;
pub mod result;
pub mod runner;
pub mod scenarios;
pub mod scripted;
pub mod scripts;
pub mod sequencer;
pub mod sync;
pub mod template;

pub use config::RunConfig;
pub use credentials::{CredentialMode, Credentials};
pub use driver::FlowDriver;
pub use engine::{BrowserEngine, EngineFactory};
pub use error::{HarnessError, HarnessResult};
pub use flow::{Condition, Flow, FlowStep, Stage};
pub use result::{CheckpointOutcome, RunResult};
pub use runner::FlowRunner;
pub use sequencer::StepSequencer;
