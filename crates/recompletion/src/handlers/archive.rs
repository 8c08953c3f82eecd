use std::sync::Arc;

use crate::error::HandlerError;
use crate::host::ArchiveStore;

use super::{ResetContext, ResetHandler};

/// Copies the completion record to the archive before it is cleared.
pub struct CompletionArchiveHandler {
    store: Arc<dyn ArchiveStore>,
}

impl CompletionArchiveHandler {
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }
}

impl ResetHandler for CompletionArchiveHandler {
    fn name(&self) -> &str {
        "archive"
    }

    fn before_reset(&self, ctx: &ResetContext<'_>) -> Result<(), HandlerError> {
        if !ctx.config.archive_completion_data {
            return Ok(());
        }
        self.store.archive_completion(ctx.completion, ctx.now)?;
        log::debug!(
            "Archived completion of user {} in course {}",
            ctx.user.id,
            ctx.course()
        );
        Ok(())
    }
}
