// Copyright 2026 Scribe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scribe runtime library: chromium session, configuration and CLI
//! commands around the `answer_scribe` core.
//!
//! This library crate exposes the runtime modules for integration testing.

pub mod cli;
pub mod config;
pub mod live;
pub mod logging;
pub mod renderer;
