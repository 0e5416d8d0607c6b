use thiserror::Error;

/// Why a soft-delete style operation could not find its target.
///
/// Reads never produce this; a missing key on `get`/`exists` is reported
/// through `Option`/`bool`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum CollectionError {
    #[error("no entry stored under the given key")]
    MissingKey,
    #[error("no group stored under the given outer key")]
    MissingGroup,
    #[error("group exists but holds no entry for the given inner key")]
    MissingEntry,
}
