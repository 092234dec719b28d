//! Write preconditions.

use crate::error::{Error, Result};
use docwire_codec::Timestamp;
use docwire_protocol::WirePrecondition;

/// A condition on the target document, checked by the backend at commit.
///
/// Exactly one of the two conditions must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Precondition {
    /// The document must (or must not) exist.
    pub exists: Option<bool>,
    /// The document must have been last updated at exactly this time.
    pub last_update_time: Option<Timestamp>,
}

/// Which write a precondition is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PreconditionTarget {
    Update,
    Delete,
}

impl Precondition {
    /// Requires the document to exist, or not.
    pub fn exists(exists: bool) -> Self {
        Self {
            exists: Some(exists),
            last_update_time: None,
        }
    }

    /// Requires the document's last update time to match.
    pub fn last_update_time(time: Timestamp) -> Self {
        Self {
            exists: None,
            last_update_time: Some(time),
        }
    }

    pub(crate) fn to_wire(self, target: PreconditionTarget) -> Result<WirePrecondition> {
        match (self.exists, self.last_update_time) {
            (Some(_), Some(_)) => Err(Error::invalid_argument(
                "Input specifies more than one precondition.",
            )),
            (None, None) => Err(Error::invalid_argument(
                "Input specifies no precondition; set exists or last_update_time.",
            )),
            (Some(false), None) if target == PreconditionTarget::Update => {
                Err(Error::invalid_argument(
                    "update() requires either exists: true or last_update_time.",
                ))
            }
            (Some(exists), None) => Ok(WirePrecondition::Exists(exists)),
            (None, Some(time)) => Ok(WirePrecondition::UpdateTime(time)),
        }
    }
}
