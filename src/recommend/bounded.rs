use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Resultado asentado de una sub-llamada independiente
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T> {
    Done(T),
    Skipped { reason: String },
}

impl<T> Settled<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Settled::Skipped { .. })
    }
}

/// Ejecuta sub-llamadas independientes con concurrencia acotada.
///
/// Cada tarea lleva su propio timeout; una tarea que aún no arrancó cuando se
/// observa la cancelación se salta sin llamar al catálogo.
#[derive(Debug)]
pub struct BoundedRunner {
    semaphore: Semaphore,
    task_timeout: Duration,
    cancel: CancellationToken,
}

impl BoundedRunner {
    pub fn new(max_in_flight: usize, task_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            semaphore: Semaphore::new(max_in_flight.max(1)),
            task_timeout,
            cancel,
        }
    }

    /// Lanza `task` para cada entrada; los resultados mantienen el orden de entrada.
    pub async fn run_all<I, F, Fut, T, E>(&self, inputs: Vec<I>, task: F) -> Vec<Settled<T>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let task = &task;
        let futures = inputs.into_iter().map(|input| async move {
            if self.cancel.is_cancelled() {
                return Settled::Skipped {
                    reason: "cancelled".to_string(),
                };
            }

            let Ok(_permit) = self.semaphore.acquire().await else {
                return Settled::Skipped {
                    reason: "runner closed".to_string(),
                };
            };

            // Pudo cancelarse mientras esperaba turno
            if self.cancel.is_cancelled() {
                return Settled::Skipped {
                    reason: "cancelled".to_string(),
                };
            }

            match timeout(self.task_timeout, task(input)).await {
                Ok(Ok(value)) => Settled::Done(value),
                Ok(Err(e)) => Settled::Skipped {
                    reason: e.to_string(),
                },
                Err(_) => Settled::Skipped {
                    reason: format!("timed out after {:?}", self.task_timeout),
                },
            }
        });

        join_all(futures).await
    }
}
