//! Purpose: Row-oriented access to a remote wide-column table.
//! Exports: `api` (accessor, client contract, in-memory table) and `core` (pure request/decoding logic).
//! Role: Library only; shells and transports build on `api::TableAccessor` and `api::RemoteTableClient`.
//! Invariants: Core modules are pure and never touch the network or global state.
pub mod api;
pub mod core;
