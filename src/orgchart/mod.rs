//! Org chart reassignment: drag sessions, manager succession, ordered
//! writes and the reconciliation sweep.

pub mod drag;
pub mod health;
pub mod journal;
pub mod locks;
pub mod sequencer;
pub mod succession;
pub mod sweep;
pub mod tree;
pub mod workflow;

pub use drag::{DragController, DragState, DropRequest};
pub use locks::DepartmentLocks;
pub use sequencer::{DepartmentEdit, EditReport, MovePlan, MoveReport};
pub use succession::{ChannelDialog, SuccessionChoice, SuccessionDialog, SuccessionPrompt, SuccessionResponder};
pub use sweep::{Reconciler, SweepReport, spawn_reconciler};
pub use tree::{Container, OrgNode, OrgTree};
pub use workflow::{DropOutcome, NoOpReason, ReassignPhase, Reassigner};
