//! Tickline Netcode - Tick-synchronized step exchange
//!
//! This crate holds everything both ends of a lockstep session share:
//!
//! - **Steps**: predicted inputs, composed authoritative ticks and their
//!   per-participant connect states
//! - **Queues**: the per-participant [`PredictedStepQueue`] (resets on gaps)
//!   and the [`AuthoritativeStepQueue`] window (fatal on gaps)
//! - **Wire**: big-endian codecs and the multiplexed [`ClientCommand`] /
//!   [`HostCommand`] sets, with blob transfer commands riding the same stream
//! - **Client**: [`StepClient`], the client half of the protocol
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────── client ────────────────┐        ┌──────────── host ────────────┐
//! │ push_predicted_step ─▶ outbox          │        │                              │
//! │                          │ PredictedSteps ─────▶│ PredictedStepQueue (per      │
//! │                          ▼             │        │ participant)                 │
//! │ AuthoritativeStepQueue ◀─ pending ◀────│◀────── │ AuthoritativeStepQueue       │
//! │        │            AuthoritativeSteps │        │   ▲ StepCombiner             │
//! │        ▼                               │        │                              │
//! │ pop_authoritative_step                 │        │                              │
//! └────────────────────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! The host side (registry, combiner, producer) lives in `tickline-hub`.

mod authoritative_queue;
mod client;
mod error;
mod handoff;
mod predicted_queue;
pub mod protocol;
mod step;
mod transport;
pub mod wire;

pub use authoritative_queue::{
    AuthoritativeStepQueue, AuthoritativeStepView, DEFAULT_AUTHORITATIVE_WINDOW,
};
pub use client::{ClientEvent, StepClient, StepClientConfig};
pub use error::{Error, Result};
pub use handoff::{datagram_handoff, HandoffReceiver, HandoffSender};
pub use predicted_queue::{AddOutcome, PredictedStepQueue, ReceiveReport};
pub use protocol::{ClientCommand, HostCommand, DEFAULT_MAX_DATAGRAM_OCTETS};
pub use step::{AuthoritativeStepRecord, CombinedAuthoritativeStep, ConnectState, PredictedStep};
pub use transport::Transport;
pub use wire::{AuthoritativeStepsBatch, PlayerSteps};

/// Largest payload of one predicted step
pub const MAX_STEP_PAYLOAD_OCTETS: usize = 64;
