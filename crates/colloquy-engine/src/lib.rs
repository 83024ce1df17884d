pub mod backend;
pub mod demo;
pub mod engine;
pub mod local;
pub mod remote;

pub use backend::{BackendKind, ResponseBackend, SYSTEM_PREAMBLE};
pub use demo::{category_for, DemoBackend, DEMO_BACKEND_ID};
pub use engine::{Engine, EngineConfig, EngineStatus, OptionsPatch};
pub use local::LocalBackend;
pub use remote::RemoteBackend;
