//! # Pool de Threads
//! src/server/pool.rs
//!
//! Pool de tamaño fijo que atiende conexiones. Las tareas se encolan en
//! una cola FIFO protegida por Mutex + Condvar; cada worker saca una tarea,
//! la ejecuta completa y vuelve a esperar.
//!
//! Al hacer `shutdown` la cola se cierra: las tareas ya encoladas y las que
//! están corriendo terminan normalmente y después los threads salen.

use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Una unidad de trabajo (una conexión)
type Task = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    tasks: VecDeque<Task>,
    closed: bool,
}

/// Cola compartida entre el thread que acepta y los workers
struct TaskQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

impl TaskQueue {
    /// Bloquea hasta que haya una tarea; `None` si la cola se cerró y está vacía
    fn next_task(&self) -> Option<Task> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.closed {
                return None;
            }
            state = self.condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Pool de threads de tamaño fijo
pub struct ThreadPool {
    queue: Arc<TaskQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Lanza `size` threads (mínimo 1)
    pub fn new(size: usize) -> io::Result<Self> {
        let queue = Arc::new(TaskQueue {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                closed: false,
            }),
            condvar: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(size.max(1));
        for i in 0..size.max(1) {
            let queue = Arc::clone(&queue);
            let handle = thread::Builder::new()
                .name(format!("http-worker-{}", i))
                .spawn(move || Self::worker_loop(queue))?;
            workers.push(handle);
        }

        Ok(Self { queue, workers })
    }

    /// Loop principal del worker
    fn worker_loop(queue: Arc<TaskQueue>) {
        while let Some(task) = queue.next_task() {
            // Un handler que entra en pánico no debe achicar el pool
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                log::error!("Connection task panicked on {:?}", thread::current().name());
            }
        }
    }

    /// Encola una tarea; falla si el pool ya se cerró
    pub fn execute<F>(&self, task: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.queue.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "thread pool is shut down"));
        }
        state.tasks.push_back(Box::new(task));
        self.queue.condvar.notify_one();
        Ok(())
    }

    /// Número de threads del pool
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Cierra la cola y espera a que terminen las tareas pendientes
    pub fn shutdown(&mut self) {
        {
            let mut state = self.queue.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.closed = true;
            self.queue.condvar.notify_all();
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_runs_all_tasks_before_shutdown_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = ThreadPool::new(3).unwrap();
        assert_eq!(pool.size(), 3);

        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                thread::sleep(Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_execute_after_shutdown_fails() {
        let mut pool = ThreadPool::new(1).unwrap();
        pool.shutdown();
        assert!(pool.execute(|| {}).is_err());
    }

    #[test]
    fn test_bounded_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut pool = ThreadPool::new(2).unwrap();

        for _ in 0..8 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.execute(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = ThreadPool::new(1).unwrap();

        pool.execute(|| panic!("boom")).unwrap();
        let c = Arc::clone(&counter);
        pool.execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
