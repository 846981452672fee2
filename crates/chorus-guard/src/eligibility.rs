use std::fmt;
use std::future::Future;

use tracing::{debug, warn};

use chorus_core::types::{CapabilitySet, Destination, Requirement};

/// Result of an eligibility check. Callers that only need a yes/no use
/// [`can_respond`]; `check` keeps the reason for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible { reason: String },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Evaluate a destination against the capabilities the identity holds there.
///
/// `granted` is `None` when the platform returned no capability information.
pub fn check(destination: &Destination, granted: Option<CapabilitySet>) -> Eligibility {
    match destination.requirement() {
        Requirement::Nothing => Eligibility::Eligible,
        Requirement::Unreachable => Eligibility::Ineligible {
            reason: format!("{} destination is not text-capable", destination.kind_str()),
        },
        Requirement::All(required) => match granted {
            None => Eligibility::Ineligible {
                reason: "no capability information".to_string(),
            },
            Some(held) if held.contains_all(required) => Eligibility::Eligible,
            Some(held) => {
                let missing = held
                    .missing(required)
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                Eligibility::Ineligible {
                    reason: format!("missing {missing}"),
                }
            }
        },
    }
}

/// Whether the identity may post into `destination`. Never fails.
///
/// `lookup` is only awaited for destinations that need introspection (DMs
/// and non-text destinations are decided without it). A lookup error is
/// logged and treated as "not eligible".
pub async fn can_respond<F, Fut, E>(destination: &Destination, lookup: F) -> bool
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<CapabilitySet>, E>>,
    E: fmt::Display,
{
    let granted = match destination.requirement() {
        Requirement::All(_) => match lookup().await {
            Ok(granted) => granted,
            Err(e) => {
                warn!(
                    channel = %destination.channel_id(),
                    error = %e,
                    "capability lookup failed, staying silent"
                );
                return false;
            }
        },
        _ => None,
    };

    match check(destination, granted) {
        Eligibility::Eligible => true,
        Eligibility::Ineligible { reason } => {
            debug!(channel = %destination.channel_id(), %reason, "not eligible to respond");
            false
        }
    }
}
