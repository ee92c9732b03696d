//! Repositorios de acceso a datos
//!
//! `DispatchRepository` define las unidades transaccionales del motor;
//! hay una implementación PostgreSQL y otra en memoria.

pub mod dispatch_repository;
pub mod memory_dispatch_repository;
pub mod pg_dispatch_repository;

pub use dispatch_repository::*;
pub use memory_dispatch_repository::MemoryDispatchRepository;
pub use pg_dispatch_repository::PgDispatchRepository;
