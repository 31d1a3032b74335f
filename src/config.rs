// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Daemon construction-time configuration (§10 ambient stack).
//!
//! The crate has no file-based config loader — that belongs to whatever
//! process embeds it — but the parameters a daemon would pass at startup are
//! grouped here as a `serde`-derived struct, the convention this crate's
//! teacher lineage uses for execution/processor configuration.

use serde::{Deserialize, Serialize};

use crate::pool::PAGE_SIZE;

/// Startup parameters for one daemon instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Override for the pool's region rounding granularity. Must stay a
    /// power of two; defaults to the platform page size.
    pub pool_page_size: usize,
    /// Default `minsize` used for a ringbuffer meta when a node doesn't
    /// declare one explicitly.
    pub default_ringbuffer_capacity: u32,
    /// `tracing-subscriber` `EnvFilter` directive applied at startup (e.g.
    /// `"mediagraphd=debug"`).
    pub log_filter: LogFilter,
}

/// A fixed set of log verbosity levels, serialisable as a plain string
/// rather than requiring callers to hand-write an `EnvFilter` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFilter {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogFilter {
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogFilter::Error => "mediagraphd=error",
            LogFilter::Warn => "mediagraphd=warn",
            LogFilter::Info => "mediagraphd=info",
            LogFilter::Debug => "mediagraphd=debug",
            LogFilter::Trace => "mediagraphd=trace",
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pool_page_size: PAGE_SIZE,
            default_ringbuffer_capacity: 4096,
            log_filter: LogFilter::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_platform_page_size() {
        assert_eq!(DaemonConfig::default().pool_page_size, PAGE_SIZE);
    }

    #[test]
    fn round_trips_through_json() {
        let config = DaemonConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: DaemonConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
