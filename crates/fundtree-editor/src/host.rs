use async_trait::async_trait;
use fundtree_core::Forest;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    #[error("host rejected the forest: {0}")]
    Rejected(String),
}

/// The environment that persists or validates a new forest before the editor
/// renders it.
///
/// The editor awaits the commit and only replaces its forest when the commit
/// succeeds. A rejection leaves the previous forest in place; nothing is
/// retried.
#[async_trait(?Send)]
pub trait ForestHost {
    async fn commit_forest(&self, forest: &Forest) -> Result<(), CommitError>;
}

#[async_trait(?Send)]
impl<F> ForestHost for F
where
    F: Fn(&Forest) -> Result<(), CommitError>,
{
    async fn commit_forest(&self, forest: &Forest) -> Result<(), CommitError> {
        self(forest)
    }
}

/// Host that accepts every commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait(?Send)]
impl ForestHost for AcceptAll {
    async fn commit_forest(&self, _forest: &Forest) -> Result<(), CommitError> {
        Ok(())
    }
}
