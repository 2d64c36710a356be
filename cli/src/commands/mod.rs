// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the hcoord CLI

pub mod config;
pub mod serve;
pub mod status;

pub use self::config::ConfigCommand;
