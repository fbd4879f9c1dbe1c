/// Static achievement/code tables and the unlock evaluator.
pub mod achievement_service;
/// Shared-background change gate in front of the moderation check.
pub mod background_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Server event fan-out to connected sockets.
pub mod events;
/// Health check service.
pub mod health_service;
/// AFK eviction sweep for the wolf role.
pub mod liveness;
/// Image-moderation API client.
pub mod moderation;
/// Pending-distance reconciliation sweep.
pub mod reconciliation;
/// WebSocket connection and message handling service.
pub mod session_service;
/// Account statistics read-modify-write operations.
pub mod stats_service;
/// Storage connection supervisor.
pub mod storage_supervisor;
