//! Interaction orchestration — the record → infer → speak state machine.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use avatar_voice::interaction::{InteractionEvent, InteractionStateMachine};
//! use tokio::sync::mpsc;
//!
//! # async fn demo(machine: InteractionStateMachine) {
//! let (events_tx, events_rx) = mpsc::channel(16);
//! tokio::spawn(machine.run(events_rx));
//!
//! events_tx.send(InteractionEvent::StartRecording).await.ok();
//! // … user speaks …
//! events_tx.send(InteractionEvent::StopRecording).await.ok();
//! # }
//! ```

pub mod machine;
pub mod state;

pub use machine::{InteractionError, InteractionEvent, InteractionStateMachine, TurnSettings};
pub use state::{new_shared_turn_state, InteractionState, SharedTurnState, TurnState};
