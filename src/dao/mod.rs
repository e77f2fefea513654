/// Tournament document persistence backends.
pub mod document_store;
/// Local snapshot cache used as a fallback when the store is unreachable.
pub mod local_cache;
/// Persistence envelope and listing models.
pub mod models;
/// Storage abstraction layer errors.
pub mod storage;
