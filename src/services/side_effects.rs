//! Efectos secundarios best-effort
//!
//! Creación de incidentes y envío de push se ejecutan como tareas tokio
//! independientes con reintentos y backoff exponencial. La operación que
//! los lanza nunca observa su resultado; `drain()` espera a las pendientes
//! al apagar el servidor y en los tests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::utils::errors::AppResult;

/// Ejecuta `op` hasta `max_attempts` veces, duplicando la espera entre intentos
pub async fn with_retry<F, Fut, T>(
    label: &str,
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let delay = base_delay * 2u32.pow(attempt - 1);
                tracing::warn!(
                    "⚠️ {} failed (attempt {}/{}), retrying in {:?}: {}",
                    label,
                    attempt,
                    max_attempts,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!("❌ {} gave up after {} attempts: {}", label, attempt, e);
                return Err(e);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

pub struct SideEffectRunner {
    max_attempts: u32,
    base_delay: Duration,
    handles: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl SideEffectRunner {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            handles: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Lanza `op` en segundo plano con reintentos
    pub async fn spawn<F, Fut>(&self, label: &'static str, op: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        let max_attempts = self.max_attempts;
        let base_delay = self.base_delay;
        let counters = self.counters.clone();

        let handle = tokio::spawn(async move {
            match with_retry(label, max_attempts, base_delay, op).await {
                Ok(()) => {
                    counters.succeeded.fetch_add(1, Ordering::SeqCst);
                }
                Err(_) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        let mut handles = self.handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Espera a que terminen todas las tareas lanzadas hasta ahora
    pub async fn drain(&self) {
        let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock().await);
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::error!("❌ Side effect task panicked: {}", e);
            }
        }
    }

    pub fn succeeded(&self) -> usize {
        self.counters.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.counters.failed.load(Ordering::SeqCst)
    }
}

impl Default for SideEffectRunner {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}
