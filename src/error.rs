// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Any error that may arise from buffer operations.
///
/// The only failure channel of the buffer is block allocation; every other
/// operation is infallible given valid preconditions (which are checked via
/// debug assertions).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool allocator could not obtain a chunk from the underlying
    /// memory source.
    ///
    /// Operations that return this error leave the buffer observably
    /// unchanged - partially staged blocks are returned to the pool before
    /// the error propagates.
    #[error("pool allocation failed: out of memory")]
    OutOfMemory,
}

/// A specialized `Result` for buffer operations.
pub type Result<T> = std::result::Result<T, Error>;
