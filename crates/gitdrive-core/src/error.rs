use thiserror::Error;

/// Error kinds surfaced by the mutation layer.
///
/// Remote errors are never retried here; they propagate to the caller with
/// the upstream message attached. `Conflict` on a ref update is terminal
/// for that invocation — the caller must re-invoke from a fresh head read.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("remote error: {0}")]
    Remote(String),

    /// Local persistence (activity/metadata/key store) failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A recursive folder delete stopped partway through. Children listed
    /// in `deleted` remain deleted; there is no rollback.
    #[error("partial delete: {} removed, {} failed", deleted.len(), failed.len())]
    PartialDelete {
        deleted: Vec<String>,
        failed: Vec<(String, String)>,
    },
}

impl DriveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DriveError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_delete_counts_in_message() {
        let e = DriveError::PartialDelete {
            deleted: vec!["a.txt".into(), "b.txt".into()],
            failed: vec![("c.txt".into(), "boom".into())],
        };
        assert_eq!(e.to_string(), "partial delete: 2 removed, 1 failed");
    }

    #[test]
    fn kind_predicates() {
        assert!(DriveError::NotFound("x".into()).is_not_found());
        assert!(DriveError::Conflict("ref moved".into()).is_conflict());
        assert!(!DriveError::Remote("500".into()).is_conflict());
    }
}
