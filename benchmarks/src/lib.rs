// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! Criterion benchmarks for the recording hot path and the pacer.
//!
//! See the `benches/` directory; this crate intentionally exports nothing.
