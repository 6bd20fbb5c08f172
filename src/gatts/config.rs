use tracing::warn;

use super::*;

/// Runtime policy of the attribute database.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// Handling of failed authorization reply calls.
    pub reply_failure: ReplyFailure,
    /// Validate prepared-write chunk offsets before executing a queued write.
    /// When disabled, chunks are concatenated in arrival order and their
    /// offsets are not checked against each other.
    pub strict_prepared_writes: bool,
    /// Subscription state chosen when a client sets both the notify and
    /// indicate bits of a CCCD.
    pub prefer_indications: bool,
}

impl Config {
    /// Returns the default configuration.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reply_failure: ReplyFailure::Ignore,
            strict_prepared_writes: false,
            prefer_indications: true,
        }
    }
}

impl Default for Config {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

/// Policy for failures of the authorization reply call itself.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyFailure {
    /// Log the failure and continue as if the reply was delivered. The
    /// associated write is still applied locally. The failure is assumed to be
    /// transient, so the client and server views may briefly disagree.
    #[default]
    Ignore,
    /// Return the failure to the caller without applying the associated local
    /// mutation.
    Abort,
}

impl ReplyFailure {
    /// Applies the policy to the result of a reply call.
    pub(super) fn check(self, r: std::result::Result<(), DriverError>) -> Result<()> {
        match (r, self) {
            (Ok(()), _) => Ok(()),
            (Err(e), Self::Ignore) => {
                warn!("Authorization reply failed, continuing: {e}");
                Ok(())
            }
            (Err(e), Self::Abort) => Err(Error::Driver(e)),
        }
    }
}
