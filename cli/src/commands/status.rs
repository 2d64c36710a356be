// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `hcoord status`: health, open circuits and healing activity of a running
//! coordinator.

use anyhow::{Context, Result};
use colored::Colorize;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub uptime_seconds: u64,
    #[serde(default)]
    pub active_sessions: usize,
    #[serde(default)]
    pub open_circuits: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct HealingReport {
    pub enabled: bool,
    #[serde(default)]
    pub total_actions: u64,
    #[serde(default)]
    pub skipped_remediations: u64,
    #[serde(default)]
    pub services: Vec<ServiceReport>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceReport {
    pub service_id: String,
    pub status: String,
    #[serde(default)]
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    client: Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn health(&self) -> Result<HealthReport> {
        self.get("/health").await
    }

    pub async fn healing(&self) -> Result<HealingReport> {
        self.get("/healing/statistics").await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .with_context(|| format!("Failed to reach coordinator at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("GET {} returned {}: {}", path, status, error_text);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }
}

pub async fn handle_command(url: &str) -> Result<()> {
    let client = CoordinatorClient::new(url)?;

    let health = client.health().await?;
    let status = if health.status == "healthy" {
        health.status.green()
    } else {
        health.status.yellow()
    };
    println!("{} {}", "Coordinator:".bold(), status);
    println!("  Uptime: {}s", health.uptime_seconds);
    println!("  Active sessions: {}", health.active_sessions);
    for circuit in &health.open_circuits {
        println!("  {} circuit open: {}", "!".red(), circuit);
    }

    let healing = client.healing().await?;
    println!();
    println!("{}", "Self-healing:".bold());
    if !healing.enabled {
        println!("  {}", "disabled".dimmed());
        return Ok(());
    }
    println!(
        "  Actions: {} (skipped {})",
        healing.total_actions, healing.skipped_remediations
    );
    for service in &healing.services {
        let status = match service.status.as_str() {
            "healthy" => service.status.green(),
            "degraded" => service.status.yellow(),
            _ => service.status.red(),
        };
        println!(
            "  {} {} (failures: {})",
            service.service_id, status, service.consecutive_failures
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_reads_health_and_healing() {
        let mut server = mockito::Server::new_async().await;
        let _health = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"degraded","uptime_seconds":42,"active_sessions":3,"open_circuits":["vector_store:patterns"]}"#,
            )
            .create_async()
            .await;
        let _healing = server
            .mock("GET", "/healing/statistics")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"enabled":true,"total_actions":2,"skipped_remediations":1,"recent_actions":[],"circuit_breakers":[],
                    "services":[{"service_id":"qdrant","status":"unhealthy","consecutive_failures":4}]}"#,
            )
            .create_async()
            .await;

        let client = CoordinatorClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "degraded");
        assert_eq!(health.open_circuits, vec!["vector_store:patterns"]);

        let healing = client.healing().await.unwrap();
        assert!(healing.enabled);
        assert_eq!(healing.services[0].consecutive_failures, 4);

        handle_command(&server.url()).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _health = server
            .mock("GET", "/health")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = CoordinatorClient::new(&server.url()).unwrap();
        let error = client.health().await.unwrap_err();
        assert!(error.to_string().contains("500"));
    }
}
