//! Host Configuration - Composition gating, window sizes and blob tuning
//!
//! Every field has a default, so a RON file only needs the values it changes:
//!
//! ```ron
//! (
//!     composition: (compose_when_all_present_lead: 5, compose_regardless_lead: 15),
//!     authoritative_window: 60,
//!     predicted_queue_capacity: 64,
//!     max_datagram_octets: 1100,
//!     blob: (
//!         chunk_size: 1024,
//!         max_chunks_per_call: 4,
//!         resend_interval_ms: 200,
//!         length_policy: Reject,
//!     ),
//! )
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tickline_blob::wire::SET_CHUNK_OVERHEAD;
use tickline_blob::BlobConfig;
use tickline_core::{TickId, MAX_PARTICIPANTS};
use tickline_netcode::{
    DEFAULT_AUTHORITATIVE_WINDOW, DEFAULT_MAX_DATAGRAM_OCTETS, MAX_STEP_PAYLOAD_OCTETS,
};

/// Octets of the sequence header in front of every command
const DATAGRAM_HEADER_OCTETS: usize = 2;

/// Command byte, start tick and record count of an AuthoritativeSteps batch
const BATCH_HEADER_OCTETS: usize = 1 + 4 + 1;

/// Participant count in front of one record
const RECORD_HEADER_OCTETS: usize = 1;

/// Largest entry one participant adds to a record: header, length, payload
const PARTICIPANT_ENTRY_OCTETS: usize = 2 + MAX_STEP_PAYLOAD_OCTETS;

/// Lead thresholds deciding when the producer composes the next tick
///
/// The lead is how many ticks past the tick to compose the furthest-ahead
/// participant has buffered. Lower values cut latency; higher values give
/// stragglers more time before their input is synthesised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionThresholds {
    /// Compose once the lead exceeds this and every participant can contribute
    pub compose_when_all_present_lead: u32,
    /// Compose once the lead exceeds this, whoever is missing
    pub compose_regardless_lead: u32,
}

impl Default for CompositionThresholds {
    fn default() -> Self {
        Self {
            compose_when_all_present_lead: 5,
            compose_regardless_lead: 15,
        }
    }
}

/// Configuration for a [`crate::Host`]
///
/// # Example
///
/// ```
/// use tickline_hub::HostConfig;
///
/// let config = HostConfig::from_ron_str("(authoritative_window: 120)").unwrap();
/// assert_eq!(config.authoritative_window, 120);
/// assert_eq!(config.composition.compose_regardless_lead, 15);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub composition: CompositionThresholds,
    /// Composed ticks kept for client catch-up
    pub authoritative_window: usize,
    /// Predicted steps buffered per participant
    pub predicted_queue_capacity: usize,
    /// Upper bound for every outgoing datagram
    pub max_datagram_octets: usize,
    /// First tick the host composes
    pub first_tick_id: TickId,
    pub blob: BlobConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            composition: CompositionThresholds::default(),
            authoritative_window: DEFAULT_AUTHORITATIVE_WINDOW,
            predicted_queue_capacity: 64,
            max_datagram_octets: DEFAULT_MAX_DATAGRAM_OCTETS,
            first_tick_id: TickId(0),
            blob: BlobConfig::default(),
        }
    }
}

impl HostConfig {
    /// Parse and validate a RON document
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let config: HostConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Participants whose worst-case record still fits one datagram
    ///
    /// Every composed tick must be deliverable on its own, so the host
    /// refuses registrations beyond this.
    pub fn max_participants(&self) -> usize {
        let fixed = DATAGRAM_HEADER_OCTETS + BATCH_HEADER_OCTETS + RECORD_HEADER_OCTETS;
        let fitting = self.max_datagram_octets.saturating_sub(fixed) / PARTICIPANT_ENTRY_OCTETS;
        fitting.min(MAX_PARTICIPANTS)
    }

    /// Check the values a session cannot run with
    pub fn validate(&self) -> Result<()> {
        let composition = &self.composition;
        if composition.compose_when_all_present_lead > composition.compose_regardless_lead {
            return Err(Error::InvalidConfig(format!(
                "compose_when_all_present_lead ({}) must not exceed compose_regardless_lead ({})",
                composition.compose_when_all_present_lead, composition.compose_regardless_lead
            )));
        }
        if self.authoritative_window == 0 {
            return Err(Error::InvalidConfig(
                "authoritative_window must be greater than 0".to_string(),
            ));
        }
        if self.predicted_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "predicted_queue_capacity must be greater than 0".to_string(),
            ));
        }
        self.blob
            .validate()
            .map_err(|error| Error::InvalidConfig(error.to_string()))?;

        if self.max_participants() == 0 {
            return Err(Error::InvalidConfig(format!(
                "max_datagram_octets ({}) cannot carry a record for one participant",
                self.max_datagram_octets
            )));
        }

        let chunk_datagram = DATAGRAM_HEADER_OCTETS + SET_CHUNK_OVERHEAD + self.blob.chunk_size;
        if chunk_datagram > self.max_datagram_octets {
            return Err(Error::InvalidConfig(format!(
                "max_datagram_octets ({}) cannot carry a {}-octet chunk ({} octets needed)",
                self.max_datagram_octets, self.blob.chunk_size, chunk_datagram
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.composition.compose_when_all_present_lead, 5);
        assert_eq!(config.composition.compose_regardless_lead, 15);
        assert_eq!(config.authoritative_window, 60);
        assert_eq!(config.max_datagram_octets, 1100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_document() {
        let config = HostConfig::from_ron_str(
            r#"(
                composition: (compose_when_all_present_lead: 3, compose_regardless_lead: 10),
                authoritative_window: 90,
                predicted_queue_capacity: 32,
                max_datagram_octets: 1200,
                first_tick_id: 500,
                blob: (
                    chunk_size: 512,
                    max_chunks_per_call: 8,
                    resend_interval_ms: 150,
                    length_policy: ApplyAndLog,
                ),
            )"#,
        )
        .unwrap();
        assert_eq!(config.composition.compose_regardless_lead, 10);
        assert_eq!(config.first_tick_id, TickId(500));
        assert_eq!(config.blob.resend_interval_ms, 150);
        assert_eq!(
            config.blob.length_policy,
            tickline_blob::ChunkLengthPolicy::ApplyAndLog
        );
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let error = HostConfig::from_ron_str(
            "(composition: (compose_when_all_present_lead: 20, compose_regardless_lead: 15))",
        )
        .unwrap_err();
        assert!(matches!(error, Error::InvalidConfig(_)));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_chunk_must_fit_datagram() {
        let config = HostConfig {
            max_datagram_octets: 1000,
            ..HostConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_participant_limit_follows_datagram_size() {
        // 2 + 6 + 1 + 16 * 66 = 1065 fits 1100, a 17th entry would need 1131
        assert_eq!(HostConfig::default().max_participants(), 16);

        let large = HostConfig {
            max_datagram_octets: 8000,
            ..HostConfig::default()
        };
        assert_eq!(large.max_participants(), 64);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            HostConfig::from_ron_str("(authoritative_window: \"many\")"),
            Err(Error::Ron(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            HostConfig::load("/nonexistent/tickline-host.ron"),
            Err(Error::Io(_))
        ));
    }
}
