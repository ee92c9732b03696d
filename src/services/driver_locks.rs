//! Exclusión mutua por conductor
//!
//! Toda transición de un turno toma antes el lock de su conductor, de modo
//! que dos `Start` concurrentes del mismo conductor se serializan.
//! La entrada del conductor se elimina al soltar el último lease.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = Arc<SyncMutex<HashMap<Uuid, Arc<Mutex<()>>>>>;

#[derive(Debug, Default)]
pub struct DriverLocks {
    locks: LockMap,
}

/// Lock tomado sobre un conductor; se libera al soltarse
#[derive(Debug)]
pub struct DriverLease {
    guard: Option<OwnedMutexGuard<()>>,
    driver_id: Uuid,
    locks: LockMap,
}

impl Drop for DriverLease {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock();
        // Solo el mapa referencia el mutex: nadie lo tiene ni lo espera
        if locks
            .get(&self.driver_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.driver_id);
        }
    }
}

impl DriverLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, driver_id: Uuid) -> DriverLease {
        let lock = self
            .locks
            .lock()
            .entry(driver_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        DriverLease {
            guard: Some(guard),
            driver_id,
            locks: self.locks.clone(),
        }
    }

    /// Conductores con un lease vivo o en espera
    pub fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_driver_serializes() {
        let locks = Arc::new(DriverLocks::new());
        let driver = Uuid::new_v4();

        let guard = locks.acquire(driver).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(driver).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        // El conductor sigue registrado mientras alguien espera
        assert_eq!(locks.tracked(), 1);
        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_different_drivers_do_not_block() {
        let locks = DriverLocks::new();
        let _first = locks.acquire(Uuid::new_v4()).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(Uuid::new_v4())).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_released_drivers_are_pruned() {
        let locks = DriverLocks::new();
        for _ in 0..10 {
            let _lease = locks.acquire(Uuid::new_v4()).await;
        }
        assert_eq!(locks.tracked(), 0);

        let driver = Uuid::new_v4();
        let lease = locks.acquire(driver).await;
        assert_eq!(locks.tracked(), 1);
        drop(lease);
        let _again = locks.acquire(driver).await;
        assert_eq!(locks.tracked(), 1);
    }
}
