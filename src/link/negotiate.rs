// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Format negotiation (§4.3 Negotiate).
//!
//! The link-level format filter (§3) is applied to both the input's outer
//! enumeration and the output's inner enumeration — the spec's literal
//! `filter=null` for step 1 is read as "no *additional* filter beyond the
//! link's own", since that is the only reading under which scenario S3
//! (a filter accepting only 48000 Hz against a 44100 Hz-only source)
//! actually fails negotiation. See DESIGN.md for this decision.

use crate::node::{EnumFormats, NodeContract};
use crate::port::{EnumCursor, Format, FormatFilter, PortId};

use super::error::LinkError;

/// Intersect two filters field-by-field. Returns `None` if any field
/// conflicts (the combination can never match anything).
fn intersect(a: &FormatFilter, b: &FormatFilter) -> Option<FormatFilter> {
    fn merge<T: PartialEq + Copy>(x: Option<T>, y: Option<T>) -> Option<Option<T>> {
        match (x, y) {
            (Some(x), Some(y)) => (x == y).then_some(Some(x)),
            (Some(x), None) => Some(Some(x)),
            (None, Some(y)) => Some(Some(y)),
            (None, None) => Some(None),
        }
    }
    Some(FormatFilter {
        rate: merge(a.rate, b.rate)?,
        channels: merge(a.channels, b.channels)?,
        sample_format: merge(a.sample_format, b.sample_format)?,
    })
}

/// Run the negotiate step: find a format both sides accept and apply it.
///
/// Returns the fixated, chosen format on success.
pub fn negotiate(
    output: &mut dyn NodeContract,
    output_port: PortId,
    input: &mut dyn NodeContract,
    input_port: PortId,
    link_filter: Option<&FormatFilter>,
) -> Result<Format, LinkError> {
    let base_filter = link_filter.cloned().unwrap_or_default();
    let mut cursor = EnumCursor::default();

    loop {
        let (input_candidate, next_cursor) =
            match input.enum_formats(input_port, &base_filter, cursor) {
                EnumFormats::End => {
                    return Err(LinkError::no_common_format(
                        "input port exhausted its format candidates",
                    ))
                }
                EnumFormats::Candidate(fmt, next) => (fmt, next),
            };
        cursor = next_cursor;

        let Some(candidate_filter) =
            intersect(&FormatFilter::from_format(&input_candidate), &base_filter)
        else {
            // Contradicts the link filter; try the next input candidate.
            continue;
        };

        match output.enum_formats(output_port, &candidate_filter, EnumCursor::default()) {
            EnumFormats::End => continue, // restart output iteration with the next input candidate
            EnumFormats::Candidate(output_candidate, _) => {
                return Ok(output_candidate.fixate());
            }
        }
    }
}
