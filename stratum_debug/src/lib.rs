// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pretty-printing and JSON dumps for stratum draw-property diagnostics.
//!
//! This crate provides development aids on top of `stratum_core`:
//!
//! - [`pretty::PrettyPrintSink`]: a [`DrawTraceSink`](stratum_core::trace::DrawTraceSink)
//!   writing human-readable one-line-per-event output.
//! - [`dump::pass_to_json`]: a JSON snapshot of a computed pass (render
//!   surfaces, layer lists, per-layer outputs), and
//!   [`dump::mismatches_to_json`] for verification reports.

pub mod dump;
pub mod pretty;
