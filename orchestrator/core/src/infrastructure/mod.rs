// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cache;
pub mod embedding_client;
pub mod event_bus;
pub mod resilience;
pub mod runtime;
pub mod telemetry_log;
pub mod vector_store;

pub use cache::LruCacheStore;
pub use event_bus::EventBus;
pub use telemetry_log::JsonlTelemetryLog;
