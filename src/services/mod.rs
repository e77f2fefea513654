/// Clock ticker feeding elapsed time into the running countdown.
pub mod clock_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
/// Synchronization controller owning every change to the tournament.
pub mod sync_service;
/// Tournament operations backing the REST routes.
pub mod tournament_service;
