use std::{
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::service::WallpaperService;

pub trait Pause: Send + Sync {
    /// Block for up to `duration`. Returns `true` if a stop was requested meanwhile.
    fn pause(&self, duration: Duration, stop: &Receiver<()>) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelPause;

impl Pause for ChannelPause {
    fn pause(&self, duration: Duration, stop: &Receiver<()>) -> bool {
        match stop.recv_timeout(duration) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct AutoChanger {
    service: Arc<WallpaperService>,
    pause: Arc<dyn Pause>,
    worker: Mutex<Option<Worker>>,
}

impl AutoChanger {
    pub fn new(service: Arc<WallpaperService>) -> Self {
        Self::with_pause(service, Arc::new(ChannelPause))
    }

    pub fn with_pause(service: Arc<WallpaperService>, pause: Arc<dyn Pause>) -> Self {
        Self {
            service,
            pause,
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.worker()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    pub fn start(&self) -> bool {
        let mut slot = self.worker();
        if slot.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("auto-changer already running");
            return false;
        }
        if let Some(finished) = slot.take() {
            let _ = finished.handle.join();
        }

        let Some(interval) = self.service.auto_change_interval() else {
            debug!("no auto-change interval configured");
            return false;
        };

        let (stop_tx, stop_rx) = mpsc::channel();
        let service = Arc::clone(&self.service);
        let pause = Arc::clone(&self.pause);

        let spawned = thread::Builder::new()
            .name("auto-changer".to_string())
            .spawn(move || run_loop(&service, &*pause, &stop_rx));

        match spawned {
            Ok(handle) => {
                info!("auto-changer started (every {interval:?})");
                *slot = Some(Worker {
                    stop: stop_tx,
                    handle,
                });
                true
            }
            Err(err) => {
                warn!("failed to spawn auto-changer thread: {err}");
                false
            }
        }
    }

    /// Joins the worker, so an in-flight change finishes first.
    pub fn stop(&self) {
        let Some(worker) = self.worker().take() else {
            return;
        };

        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            warn!("auto-changer thread panicked");
        }
        info!("auto-changer stopped");
    }
}

impl Drop for AutoChanger {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(service: &WallpaperService, pause: &dyn Pause, stop: &Receiver<()>) {
    loop {
        if stop.try_recv().is_ok() {
            break;
        }
        if service.auto_change_interval().is_none() {
            debug!("auto-change interval unset, leaving loop");
            break;
        }

        // Failures are reported by the service; the next cycle tries again.
        let _ = service.set_wallpapers();

        // Re-read so a settings change applies from the next cycle.
        let Some(interval) = service.auto_change_interval() else {
            break;
        };
        if pause.pause(interval, stop) {
            break;
        }
    }
}
