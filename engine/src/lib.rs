//! Captain Engine Library
//!
//! This library provides the orchestration hub and everything wired around it.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// Non-critical operation helpers
pub mod best_effort;

/// LLM collaborator: message model, chat model trait, OpenAI client
pub mod llm;

/// Sync memory adapter and conversational thread
pub mod memory;

/// Workcell lifecycle and step I/O
pub mod workcell;

/// Spokes, runners and the registry router
pub mod registry;

/// Orchestration hub, coder phases and chat facade
pub mod hub;

/// Run submission, status and chat entry points
pub mod service;

/// Process-scoped dependency wiring
pub mod bootstrap;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
