//! Named background behaviours owned by a scene.
//!
//! A system runs as its own task over a shared [`Scene`]. The scene can ask
//! every system to stop and wait until each has confirmed. Confirmation is a
//! call to [`Scene::remove_system`], which [`spawn_system`] makes once the
//! system's task returns.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::SceneError;
use crate::scene::Scene;

/// A named, independently scheduled unit of background behaviour.
pub trait System: Send + Sync {
    /// The system's name, unique within its scene.
    fn name(&self) -> &str;

    /// Request the system to stop. Must not block; the system confirms later.
    fn stop(&self);
}

/// A cloneable stop flag.
///
/// Systems keep one, set it from [`System::stop`], and select on
/// [`StopSignal::stopped`] in their task loop.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    /// Create an unset signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Set the signal. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once [`StopSignal::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal is set. Resolves immediately if it already is.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Register `system` with `scene` and run `task` as its body.
///
/// When `task` returns, the system is removed from the scene, which confirms
/// its shutdown to [`Scene::stop_systems`]. The task is expected to return
/// once the system has been asked to stop.
///
/// # Errors
///
/// Returns [`SceneError::DuplicateSystem`] if the name is taken; `task` is
/// not started in that case.
pub fn spawn_system<F>(
    scene: &Arc<Scene>,
    system: Arc<dyn System>,
    task: F,
) -> Result<JoinHandle<()>, SceneError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let name = system.name().to_string();
    scene.add_system(system)?;
    info!(system = name, "system started");

    let scene = Arc::clone(scene);
    Ok(tokio::spawn(async move {
        task.await;
        match scene.remove_system(&name) {
            Ok(()) => info!(system = name, "system stopped"),
            Err(e) => error!(system = name, %e, "system shutdown confirmation failed"),
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// A system that only waits for its stop signal.
    struct Idle {
        name: String,
        signal: StopSignal,
        stops: AtomicUsize,
    }

    impl Idle {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                signal: StopSignal::new(),
                stops: AtomicUsize::new(0),
            })
        }
    }

    impl System for Idle {
        fn name(&self) -> &str {
            &self.name
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.signal.stop();
        }
    }

    fn spawn_idle(scene: &Arc<Scene>, name: &str) -> Arc<Idle> {
        let sys = Idle::new(name);
        let signal = sys.signal.clone();
        spawn_system(scene, sys.clone(), async move { signal.stopped().await }).unwrap();
        sys
    }

    #[tokio::test]
    async fn test_stop_systems_with_none_returns_immediately() {
        let scene = Scene::new();
        tokio::time::timeout(Duration::from_secs(1), scene.stop_systems())
            .await
            .expect("stop_systems must not block without systems");
    }

    #[tokio::test]
    async fn test_stop_systems_waits_for_every_confirmation() {
        let scene = Arc::new(Scene::new());
        let a = spawn_idle(&scene, "a");
        let b = spawn_idle(&scene, "b");
        assert_eq!(scene.outstanding_systems(), 2);

        tokio::time::timeout(Duration::from_secs(5), scene.stop_systems())
            .await
            .expect("systems should confirm shutdown");

        assert_eq!(scene.outstanding_systems(), 0);
        assert!(scene.system_names().is_empty());
        assert_eq!(a.stops.load(Ordering::SeqCst), 1);
        assert_eq!(b.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_systems_blocks_until_slow_system_confirms() {
        let scene = Arc::new(Scene::new());
        let sys = Idle::new("slow");
        let signal = sys.signal.clone();
        spawn_system(&scene, sys, async move {
            signal.stopped().await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        })
        .unwrap();

        scene.stop_systems().await;
        assert_eq!(scene.outstanding_systems(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_system_rejected() {
        let scene = Arc::new(Scene::new());
        let _a = spawn_idle(&scene, "wander");
        let err = scene.add_system(Idle::new("wander")).unwrap_err();
        assert_eq!(err, SceneError::DuplicateSystem("wander".to_string()));
        assert_eq!(scene.outstanding_systems(), 1);
        scene.stop_systems().await;
    }

    #[test]
    fn test_over_removal_rejected() {
        let scene = Scene::new();
        scene.add_system(Idle::new("a")).unwrap();
        scene.remove_system("a").unwrap();
        assert_eq!(
            scene.remove_system("a").unwrap_err(),
            SceneError::SystemNotRegistered("a".to_string())
        );
        assert_eq!(scene.outstanding_systems(), 0);
    }

    #[test]
    fn test_stop_signal() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_stopped());
        signal.stop();
        signal.stop();
        assert!(clone.is_stopped());
    }
}
