//! graphrun: a LangGraph Cloud compatible thread and streaming-run server.
//!
//! Clients built on `@langchain/langgraph-sdk` create threads, start runs and
//! read thread state over HTTP. A run drives a [`GraphEngine`](engine::GraphEngine)
//! and relays its output as Server-Sent Events, committing the final
//! conversation snapshot to the in-memory [`ThreadStore`](store::ThreadStore)
//! once the engine finishes.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use graphrun::config::ServerConfig;
//! use graphrun::engine::AgentGraph;
//! use graphrun::orchestrator::Orchestrator;
//! use graphrun::server::{router, AppState};
//! use graphrun::store::ThreadStore;
//!
//! # async fn example() -> graphrun::error::Result<()> {
//! let config = ServerConfig::from_env()?;
//! let engine = AgentGraph::from_config(&config)?;
//! let orchestrator = Orchestrator::new(Arc::new(ThreadStore::new()), Arc::new(engine));
//! let app = router(AppState::new(orchestrator));
//! let listener = tokio::net::TcpListener::bind(config.socket_addr()?).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod server;
pub mod sse;
pub mod store;
pub mod tools;
pub mod types;
