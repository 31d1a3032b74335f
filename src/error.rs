// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Error types for the media graph core.
//!
//! `GraphError` is the in-process, richer counterpart to the wire-stable
//! [`crate::result::ResultCode`]; node implementations and internal call
//! chains use `Result<T, GraphError>`, while operations that cross the
//! node/link boundary report a `ResultCode`.

use thiserror::Error;

use crate::result::ResultCode;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("invalid buffer id: {0}")]
    InvalidBufferId(u32),

    #[error("no format set")]
    NoFormat,

    #[error("no buffers set")]
    NoBuffers,

    #[error("no common format: {0}")]
    NoCommonFormat(String),

    #[error("no common buffer alloc: {0}")]
    NoCommonBufferAlloc(String),

    #[error("pool allocation failed: {0}")]
    PoolExhausted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type that uses `GraphError`.
pub type Result<T> = std::result::Result<T, GraphError>;

impl From<&GraphError> for ResultCode {
    fn from(err: &GraphError) -> Self {
        match err {
            GraphError::InvalidArguments(_) => ResultCode::InvalidArguments,
            GraphError::InvalidPort(_) => ResultCode::InvalidPort,
            GraphError::InvalidBufferId(_) => ResultCode::InvalidBufferId,
            GraphError::NoFormat => ResultCode::NoFormat,
            GraphError::NoBuffers => ResultCode::NoBuffers,
            GraphError::NoCommonFormat(_)
            | GraphError::NoCommonBufferAlloc(_)
            | GraphError::PoolExhausted(_)
            | GraphError::Io(_)
            | GraphError::Other(_) => ResultCode::Error,
        }
    }
}
