use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::host::AttemptStore;

use super::{ResetContext, ResetHandler};

/// What happens to an activity's attempts on reset, stored under the
/// activity's name as `0`, `1` or `2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPolicy {
    #[default]
    Nothing,
    DeleteAttempts,
    ExtraAttempt,
}

impl AttemptPolicy {
    pub fn code(&self) -> u8 {
        match self {
            AttemptPolicy::Nothing => 0,
            AttemptPolicy::DeleteAttempts => 1,
            AttemptPolicy::ExtraAttempt => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AttemptPolicy::Nothing),
            1 => Some(AttemptPolicy::DeleteAttempts),
            2 => Some(AttemptPolicy::ExtraAttempt),
            _ => None,
        }
    }
}

/// Applies the configured [`AttemptPolicy`] to one activity type.
pub struct ActivityAttemptsHandler {
    activity: String,
    store: Arc<dyn AttemptStore>,
}

impl ActivityAttemptsHandler {
    pub fn new(activity: impl Into<String>, store: Arc<dyn AttemptStore>) -> Self {
        Self {
            activity: activity.into(),
            store,
        }
    }

    /// Policy configured for this activity; unset means nothing.
    pub fn policy(&self, ctx: &ResetContext<'_>) -> Result<AttemptPolicy, HandlerError> {
        let Some(value) = ctx.config.extra.get(&self.activity) else {
            return Ok(AttemptPolicy::Nothing);
        };
        if value.trim().is_empty() {
            return Ok(AttemptPolicy::Nothing);
        }
        value
            .trim()
            .parse()
            .ok()
            .and_then(AttemptPolicy::from_code)
            .ok_or_else(|| HandlerError::InvalidPolicy {
                activity: self.activity.clone(),
                value: value.clone(),
            })
    }
}

impl ResetHandler for ActivityAttemptsHandler {
    fn name(&self) -> &str {
        &self.activity
    }

    fn on_reset(&self, ctx: &ResetContext<'_>) -> Result<(), HandlerError> {
        match self.policy(ctx)? {
            AttemptPolicy::Nothing => {}
            AttemptPolicy::DeleteAttempts => {
                let removed = self
                    .store
                    .delete_attempts(&self.activity, ctx.user.id, ctx.course())?;
                log::debug!(
                    "Deleted {} {} attempt(s) of user {} in course {}",
                    removed,
                    self.activity,
                    ctx.user.id,
                    ctx.course()
                );
            }
            AttemptPolicy::ExtraAttempt => {
                self.store
                    .grant_extra_attempt(&self.activity, ctx.user.id, ctx.course())?;
                log::debug!(
                    "Granted an extra {} attempt to user {} in course {}",
                    self.activity,
                    ctx.user.id,
                    ctx.course()
                );
            }
        }
        Ok(())
    }
}
