//! A single long-lived browser that is periodically torn down and relaunched.
//!
//! Renders hold a shared lease on the current browser. Rotation takes the exclusive lease, so it
//! waits for every in-flight render to finish before the old browser is destroyed, and at most
//! one rotation runs at a time. Renders that arrive while a rotation is queued wait for the new
//! browser.

use crate::error::{Error, Result};
use core::{
    future::Future,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};
use tokio::sync::RwLock;

/// A running rendering backend.
pub trait Engine: Send + Sync + 'static {
    /// Loads the self-contained `html` into a fresh page and screenshots its root element as PNG.
    fn capture(&self, html: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Releases the backend. Failures are logged by the implementation.
    fn shutdown(self) -> impl Future<Output = ()> + Send;
}

/// Starts new [`Engine`] instances.
pub trait Launcher: Send + Sync + 'static {
    type Engine: Engine;

    fn launch(&self) -> impl Future<Output = Result<Self::Engine>> + Send;
}

pub struct BrowserPool<L: Launcher> {
    launcher: L,
    engine: RwLock<Option<L::Engine>>,
    /// Renders started on the current engine.
    served: AtomicU32,
    /// Number of renders after which the engine is replaced.
    rotate_after: u32,
    closed: AtomicBool,
}

impl<L: Launcher> BrowserPool<L> {
    /// Launches the first engine. Fails if the browser cannot start at all.
    pub async fn launch(launcher: L, rotate_after: u32) -> Result<Self> {
        let engine = launcher.launch().await?;
        log::info!("headless browser launched; rotating every {rotate_after} renders");
        Ok(Self {
            launcher,
            engine: RwLock::new(Some(engine)),
            served: AtomicU32::new(0),
            rotate_after: rotate_after.max(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Renders `html` to a PNG, rotating the engine first if it has reached its quota.
    pub async fn render(&self, html: &str) -> Result<Vec<u8>> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::Closed);
            }

            {
                let guard = self.engine.read().await;
                if let Some(engine) = guard.as_ref() {
                    if self.served.fetch_add(1, Ordering::AcqRel) < self.rotate_after {
                        return engine.capture(html).await;
                    }
                }
            }

            self.rotate().await?;
        }
    }

    /// Replaces the engine once every lease on it has been released.
    async fn rotate(&self) -> Result<()> {
        let mut guard = self.engine.write().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        // Another task may have rotated while we waited for the lock.
        if guard.is_some() && self.served.load(Ordering::Acquire) < self.rotate_after {
            return Ok(());
        }

        if let Some(engine) = guard.take() {
            log::info!("rotating headless browser after {} renders", self.rotate_after);
            engine.shutdown().await;
        }

        // Leave the slot empty on failure so that the next render retries the launch.
        let engine = self.launcher.launch().await?;
        *guard = Some(engine);
        self.served.store(0, Ordering::Release);
        Ok(())
    }

    /// Waits for in-flight renders, then shuts the engine down. Later renders fail with [`Error::Closed`].
    pub async fn shutdown(&self) {
        let mut guard = self.engine.write().await;
        self.closed.store(true, Ordering::Release);
        if let Some(engine) = guard.take() {
            engine.shutdown().await;
        }
        log::info!("browser pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::{BrowserPool, Engine, Launcher};
    use crate::error::{Error, Result};
    use std::sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    };
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct Counters {
        launches: AtomicU32,
        shutdowns: AtomicU32,
        in_flight: AtomicU32,
        fail: AtomicBool,
    }

    struct FakeEngine {
        generation: u32,
        counters: Arc<Counters>,
        gate: Option<Arc<Semaphore>>,
    }

    impl Engine for FakeEngine {
        async fn capture(&self, html: &str) -> Result<Vec<u8>> {
            self.counters.in_flight.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.map_err(|_| Error::Capture)?.forget();
            }
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            let mut png = vec![self.generation as u8];
            png.extend_from_slice(html.as_bytes());
            Ok(png)
        }

        async fn shutdown(self) {
            assert_eq!(self.counters.in_flight.load(Ordering::SeqCst), 0, "engine shut down mid-render");
            self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeLauncher {
        counters: Arc<Counters>,
        /// Held by the first engine only.
        gate: Option<Arc<Semaphore>>,
    }

    impl Launcher for FakeLauncher {
        type Engine = FakeEngine;

        async fn launch(&self) -> Result<FakeEngine> {
            if self.counters.fail.load(Ordering::SeqCst) {
                return Err(Error::Launch);
            }
            let generation = self.counters.launches.fetch_add(1, Ordering::SeqCst) + 1;
            let gate = if generation == 1 { self.gate.clone() } else { None };
            Ok(FakeEngine { generation, counters: self.counters.clone(), gate })
        }
    }

    fn launcher(counters: &Arc<Counters>) -> FakeLauncher {
        FakeLauncher { counters: counters.clone(), gate: None }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rotates_after_threshold() {
        let counters = Arc::default();
        let pool = BrowserPool::launch(launcher(&counters), 2).await.unwrap();

        let mut generations = Vec::new();
        for _ in 0..5 {
            generations.push(pool.render("x").await.unwrap()[0]);
        }

        assert_eq!(generations, [1, 1, 2, 2, 3]);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 3);
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn initial_launch_failure_is_reported() {
        let counters = Arc::<Counters>::default();
        counters.fail.store(true, Ordering::SeqCst);
        assert!(matches!(BrowserPool::launch(launcher(&counters), 5).await, Err(Error::Launch)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_rotation_fails_fast_then_recovers() {
        let counters = Arc::<Counters>::default();
        let pool = BrowserPool::launch(launcher(&counters), 1).await.unwrap();
        assert_eq!(pool.render("a").await.unwrap()[0], 1);

        counters.fail.store(true, Ordering::SeqCst);
        assert_eq!(pool.render("b").await, Err(Error::Launch));
        assert_eq!(pool.render("c").await, Err(Error::Launch));

        counters.fail.store(false, Ordering::SeqCst);
        assert_eq!(pool.render("d").await.unwrap()[0], 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rotation_drains_in_flight_renders() {
        let counters = Arc::<Counters>::default();
        let gate = Arc::new(Semaphore::new(0));
        let launcher = FakeLauncher { counters: counters.clone(), gate: Some(gate.clone()) };
        let pool = Arc::new(BrowserPool::launch(launcher, 1).await.unwrap());

        let first = tokio::spawn({
            let pool = pool.clone();
            async move { pool.render("first").await }
        });
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(counters.in_flight.load(Ordering::SeqCst), 1);

        // The second render needs a rotation, which must wait for the first render.
        let second = tokio::spawn({
            let pool = pool.clone();
            async move { pool.render("second").await }
        });
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert!(!second.is_finished());
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 0);

        gate.add_permits(1);
        assert_eq!(first.await.unwrap().unwrap()[0], 1);
        assert_eq!(second.await.unwrap().unwrap()[0], 2);
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn shutdown_rejects_later_renders() {
        let counters = Arc::<Counters>::default();
        let pool = BrowserPool::launch(launcher(&counters), 10).await.unwrap();
        pool.shutdown().await;
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(pool.render("x").await, Err(Error::Closed));
    }
}
