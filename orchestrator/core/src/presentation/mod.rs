// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer
//!
//! HTTP surface that translates requests into application service calls.
//! No business logic lives here.

pub mod api;

pub use api::{app, ApiError, AppState};
