// State machine module for the task lifecycle
//
// Tasks move Pending -> Ready -> Executing -> Finished, with Cancelled reachable
// before execution starts. The transition table lives in `task_state_machine`.

pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use states::TaskState;
pub use task_state_machine::TaskStateMachine;
