//! Tickline Hub - Host side of a lockstep session
//!
//! The host collects predicted steps from every participant, decides when a
//! tick can be composed and serves the composed ticks back to clients:
//!
//! - **Registry**: [`ParticipantRegistry`] maps `(connection, local index)`
//!   to participant ids and owns each participant's predicted step queue
//! - **Combiner**: [`StepCombiner`] splices one tick from every queue,
//!   synthesising records for missing input
//! - **Producer**: [`AuthoritativeStepProducer`] composes ticks while the
//!   [`CompositionThresholds`] say enough input is buffered
//! - **Host**: [`Host`] ties it all to datagrams, catch-up requests and blob
//!   bootstrapping
//!
//! # Composition gating
//!
//! ```text
//!   lead = latest buffered tick of the furthest-ahead participant - next tick
//!
//!   lead > compose_regardless_lead                       → compose
//!   lead > compose_when_all_present_lead, nobody missing → compose
//!   otherwise                                            → wait
//! ```
//!
//! # Example
//!
//! ```
//! use tickline_hub::{Host, HostConfig};
//!
//! let mut host = Host::new(HostConfig::default()).unwrap();
//! assert_eq!(host.tick().unwrap(), 0);
//! assert!(host.registry().is_empty());
//! ```

mod combiner;
mod config;
mod error;
mod host;
mod producer;
mod registry;

pub use combiner::{CombinerStats, StepCombiner};
pub use config::{CompositionThresholds, HostConfig};
pub use error::{Error, Result};
pub use host::Host;
pub use producer::AuthoritativeStepProducer;
pub use registry::{Availability, Participant, ParticipantRegistry};
