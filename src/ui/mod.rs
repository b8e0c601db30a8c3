// UI module - Operator interaction and the event loop bridge
//
// This module contains:
// - EventLoopBridge: Queue between the tokio runtime and the interactive thread
// - InstallerController: Consumes events and is the only writer of installer state
// - Operator: The console or native dialog surface the controller talks to
// - ProgressTicker: Cosmetic progress animation while the archive tool runs

pub mod bridge;
pub mod controller;
pub mod operator;
pub mod progress;

pub use bridge::{BridgeClosed, EventLoopBridge, EventLoopBridgeHandle, InstallerEvent};
pub use controller::InstallerController;
pub use operator::{ConsoleOperator, DialogOperator, LogLevel, Operator};
pub use progress::ProgressTicker;
