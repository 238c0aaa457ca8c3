//! # Gatehouse
//!
//! Temporary physical-access authorization for visitors of a managed
//! facility. A resident or staff member pre-authorizes a visit; the engine
//! issues a tamper-evident, time-limited, single-use credential; a gate agent
//! later presents that credential and the engine deterministically decides
//! whether to admit the visitor and records the occupancy event.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          Gatehouse                            │
//! │  ┌─────────┐   ┌─────────┐   ┌───────────┐   ┌─────────────┐  │
//! │  │  Guard  │ → │ Issuer  │ → │ Validator │ → │   Kernel    │  │
//! │  │ (block) │   │ (sign)  │   │ (verify)  │   │ (pure FSM)  │  │
//! │  └─────────┘   └─────────┘   └───────────┘   └─────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//!        reads Visitor          reads/CASes Visit via store seams
//! ```
//!
//! The engine is stateless between calls: everything durable lives behind
//! the [`gatehouse_kernel::VisitorStore`] / [`gatehouse_kernel::VisitStore`]
//! seams, and all time comes from an injected [`gatehouse_kernel::Clock`].
//!
//! # Quick Start
//!
//! ```ignore
//! use gatehouse::{Gatehouse, IssueRequest};
//! use gatehouse_config::GatehouseConfig;
//! use gatehouse_kernel::SystemClock;
//! use gatehouse_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let config = GatehouseConfig::load()?;
//! let store = Arc::new(MemoryStore::new());
//! let engine = Gatehouse::new(&config, SystemClock::new(), store.clone(), store)?;
//!
//! // Issue a credential for a pre-authorized visit
//! let issued = engine.issue(IssueRequest::new(visitor_id, unit_id))?;
//!
//! // ... credential travels to the visitor, comes back at the gate ...
//! let outcome = engine.validate(&presented)?;
//! ```

mod error;
mod gatehouse;
mod guard;
mod outcome;

pub use error::{EngineError, Result};
pub use gatehouse::{Gatehouse, IssueRequest};
pub use guard::{Admissibility, BlacklistGuard};
pub use outcome::{Issued, ValidationOutcome};
