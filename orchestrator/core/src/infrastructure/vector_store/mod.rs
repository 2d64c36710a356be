// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod memory;
pub mod qdrant;

pub use memory::{cosine_similarity, InMemoryVectorStore};
pub use qdrant::QdrantVectorStore;
