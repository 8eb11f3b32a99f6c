use chrono::DateTime;
use chrono::Utc;
use common::ProjectId;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;
use crate::Result;

#[derive(Clone)]
pub struct Context {
    pub project_id: ProjectId,
    pub cur_time: DateTime<Utc>,
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

impl Context {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            cur_time: Utc::now(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Child context, cancelling the parent cancels the child as well.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    /// Fails with [QueryError::Cancelled] once cancelled or past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(QueryError::Cancelled);
            }
        }

        Ok(())
    }
}
