//! core-actions: the command state machine and the Ex dispatcher.
//!
//! A host owns one `Session` (registry, remaps, registers, marks) and one
//! `CommandStateMachine` per view. Keys go in through
//! `CommandStateMachine::feed`; `DispatchResult`s come out, carrying
//! `ConcreteCommand`s the host executes. Nothing here touches buffers.
//!
//! Logging targets: `input.machine` (resolution and dispatch),
//! `input.macro`, `input.repeat` and `ex.dispatch`.

mod dispatch;
mod error;
mod ex;
mod machine;
mod session;
mod translate;

pub use dispatch::DispatchResult;
pub use error::MachineError;
pub use ex::run_ex_line;
pub use machine::CommandStateMachine;
pub use session::Session;
