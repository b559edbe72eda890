// Event loop bridge between the tokio runtime and a Slint window
//
// Slint components live on the GUI thread and are not Send. Background work
// runs on tokio; results travel back as boxed closures over a bounded channel
// drained by a relay thread that hands each one to upgrade_in_event_loop.

use slint::{ComponentHandle, Weak};
use std::future::Future;
use tokio::sync::mpsc;

/// Capacity of the pending-update queue; updates beyond it are dropped with a warning
const UPDATE_QUEUE_CAPACITY: usize = 100;

type UiUpdate<T> = Box<dyn FnOnce(&T) + Send>;

/// Cloneable handle that runs futures on tokio and closures on the GUI thread
///
/// # Example
/// ```ignore
/// let bridge = EventLoopBridge::new(&dialog, runtime.handle().clone());
/// let relay = bridge.clone();
/// bridge.spawn_async(move || async move {
///     let result = expensive_io().await;
///     relay.update_ui(move |dialog| dialog.set_error_text(result.into()));
/// });
/// ```
pub struct EventLoopBridge<T: ComponentHandle> {
    ui_weak: Weak<T>,
    tokio_handle: tokio::runtime::Handle,
    update_tx: mpsc::Sender<UiUpdate<T>>,
}

impl<T: ComponentHandle + 'static> EventLoopBridge<T> {
    /// Create a bridge for `ui` and start its relay thread.
    ///
    /// The relay thread exits when every bridge clone has been dropped or the
    /// event loop stops accepting work.
    pub fn new(ui: &T, tokio_handle: tokio::runtime::Handle) -> Self {
        let ui_weak = ui.as_weak();
        let (update_tx, mut update_rx) = mpsc::channel::<UiUpdate<T>>(UPDATE_QUEUE_CAPACITY);

        let relay_weak = ui_weak.clone();
        std::thread::spawn(move || {
            tracing::debug!("UI update relay started");

            while let Some(update) = update_rx.blocking_recv() {
                if let Err(e) = relay_weak.upgrade_in_event_loop(move |ui| update(&ui)) {
                    tracing::warn!("Event loop rejected UI update, stopping relay: {:?}", e);
                    break;
                }
            }

            tracing::debug!("UI update relay stopped");
        });

        Self {
            ui_weak,
            tokio_handle,
            update_tx,
        }
    }

    /// Queue `update` to run on the GUI thread. Safe to call from any thread.
    pub fn update_ui<F>(&self, update: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        match self.update_tx.try_send(Box::new(update)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("UI update queue full, dropping update");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("UI update relay has stopped, dropping update");
            }
        }
    }

    /// Run a future on the tokio runtime, typically from a Slint callback.
    pub fn spawn_async<F, Fut>(&self, future_factory: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tokio_handle.spawn(async move {
            future_factory().await;
        });
    }

    pub fn ui_weak(&self) -> &Weak<T> {
        &self.ui_weak
    }
}

// Manual impl: T itself is not Clone
impl<T: ComponentHandle> Clone for EventLoopBridge<T> {
    fn clone(&self) -> Self {
        Self {
            ui_weak: self.ui_weak.clone(),
            tokio_handle: self.tokio_handle.clone(),
            update_tx: self.update_tx.clone(),
        }
    }
}
