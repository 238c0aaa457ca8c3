//! # gatehouse-store: In-memory store for visitors and visits
//!
//! Single-process implementation of the engine's store seams
//! ([`gatehouse_kernel::VisitorStore`], [`gatehouse_kernel::VisitStore`]).
//! Suitable for tests and single-node deployments; a durable backend can
//! replace it behind the same traits without touching the engine.
//!
//! Writes are serialized per record through whole-record compare-and-swap
//! under one `RwLock`, which is what upholds the single-use invariant when
//! two gate scans race on the same credential.

mod memory;

pub use memory::MemoryStore;
