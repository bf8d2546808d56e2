//! REST API Server Module
//!
//! Serves the provider's read-only query surface over HTTP. The server shares
//! the keeper with the block-producing node and only ever takes read locks.

// Shared structures, rejection handling and the server itself
mod generic;

// Query handlers
mod queries;

pub use generic::ApiServer;
// Re-export ApiResponse for testing
#[allow(unused_imports)]
pub use generic::ApiResponse;
