// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Entities, value objects and the ports consumed by the application layer.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure model, no IO

pub mod augmentation;
pub mod cache;
pub mod context;
pub mod coordinator_config;
pub mod embedding;
pub mod error;
pub mod events;
pub mod fault;
pub mod health;
pub mod interaction;
pub mod runtime;
pub mod session;
pub mod telemetry;
pub mod vector_store;
