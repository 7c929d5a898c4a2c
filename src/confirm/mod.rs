pub mod gate;

pub use gate::{
    ActionKind, ActionPreview, ActionReport, ConfirmableAction, ConfirmationGate, GateDecision,
    GateError, OperationOutcome,
};
