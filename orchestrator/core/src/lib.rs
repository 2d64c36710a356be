// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Hybrid Context & Resilience Coordinator core
//!
//! Serves retrieval-augmented context to local language-model agents, learns
//! from completed interactions, and keeps its backing services alive.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Layout:** `domain` (entities, ports, config), `application` (use cases
//!   and background workers), `infrastructure` (Qdrant, embeddings, Docker,
//!   resilience), `presentation` (axum router)

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
