// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Application Layer
//!
//! Use cases orchestrating the domain over the infrastructure ports.
//!
//! | Module | Role |
//! |--------|------|
//! | [`augmentation`] | `augment_query`: session-aware retrieval, ranking and packing |
//! | [`context_packing`] | Token estimation, level formatting, greedy budget packing |
//! | [`semantic_cache`] | Fingerprint cache in front of retrieval |
//! | [`session_manager`] | Per-session exclusive state with idle expiry |
//! | [`feedback`] | Confidence evaluation and refinement queries |
//! | [`value_scorer`] / [`interaction_recorder`] | Continuous learning and pattern promotion |
//! | [`healing`] | Health monitoring, fault classification, remediation |
//! | [`telemetry_forwarder`] / [`maintenance`] | Background workers |

pub mod augmentation;
pub mod context_packing;
pub mod feedback;
pub mod healing;
pub mod interaction_recorder;
pub mod maintenance;
pub mod semantic_cache;
pub mod session_manager;
pub mod telemetry_forwarder;
pub mod value_scorer;

pub use augmentation::{AugmentationSettings, ContextAugmentationService};
pub use feedback::{FeedbackEvaluation, FeedbackEvaluator, FeedbackRequest};
pub use healing::{HealingOrchestrator, HealingSettings};
pub use interaction_recorder::{InteractionRecorder, InteractionReport, RecordedInteraction, RecorderSettings};
pub use maintenance::MaintenanceWorker;
pub use semantic_cache::SemanticCache;
pub use session_manager::SessionContextManager;
pub use telemetry_forwarder::TelemetryForwarder;
