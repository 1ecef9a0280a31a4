//! # Limpieza Periódica de Sesiones
//! src/session/sweeper.rs
//!
//! Thread propio que cada `interval` llama a `SessionStore::sweep_expired`,
//! sin depender del tráfico de requests.

use super::SessionStore;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Handle del thread de limpieza
pub struct SessionSweeper {
    /// `true` cuando hay que terminar
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl SessionSweeper {
    /// Lanza el thread de limpieza
    pub fn spawn(store: Arc<SessionStore>, interval: Duration) -> std::io::Result<Self> {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("session-sweeper".to_string())
            .spawn(move || Self::sweep_loop(store, interval, signal))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    fn sweep_loop(store: Arc<SessionStore>, interval: Duration, signal: Arc<(Mutex<bool>, Condvar)>) {
        let (lock, condvar) = &*signal;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next_sweep = Instant::now() + interval;

        loop {
            if *stopped {
                break;
            }

            let now = Instant::now();
            if now >= next_sweep {
                // No retener el lock de stop mientras se limpia
                drop(stopped);
                let removed = store.sweep_expired();
                if removed > 0 {
                    log::info!("Session sweep removed {} expired session(s)", removed);
                }
                next_sweep = Instant::now() + interval;
                stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
                continue;
            }

            let (guard, _) = condvar
                .wait_timeout(stopped, next_sweep - now)
                .unwrap_or_else(PoisonError::into_inner);
            stopped = guard;
        }

        log::debug!("Session sweeper stopped");
    }

    /// Detiene el thread y espera a que termine
    pub fn stop(&mut self) {
        {
            let (lock, condvar) = &*self.stop;
            *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
            condvar.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Session sweeper thread panicked");
            }
        }
    }
}

impl Drop for SessionSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
