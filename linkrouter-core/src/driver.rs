use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use tracing::{debug, info, info_span, Span};

use crate::{action::Batch, router::Shared, CoreError, CoreOptions, CoreState, RouterNotifier};

/// The name of the core thread.
const CORE_THREAD_NAME: &str = "router-core";

/// The router core driver. Owns all router state and executes the actions enqueued through
/// [`RouterCore`](crate::RouterCore), one at a time and in order.
///
/// The driver can be run in place with [`CoreDriver::process_pending`], or moved onto its own
/// thread with [`CoreDriver::spawn`].
#[derive(Debug)]
pub struct CoreDriver {
    state: CoreState,
    span: Span,
}

impl CoreDriver {
    pub(crate) fn new(shared: Arc<Shared>, options: CoreOptions) -> Self {
        let span = info_span!("core", router_id = %options.router_id);
        Self { state: CoreState::new(shared, options), span }
    }

    /// Installs the routing subsystem that is told about mobile addresses and lost peers.
    pub fn set_notifier(&mut self, notifier: impl RouterNotifier) {
        self.state.notifier = Box::new(notifier);
    }

    /// Returns the router state.
    pub fn state(&self) -> &CoreState {
        &self.state
    }

    /// Returns the router state mutably, e.g. to resolve addresses directly.
    pub fn state_mut(&mut self) -> &mut CoreState {
        &mut self.state
    }

    /// Executes every action that is pending right now, without blocking. Returns the number of
    /// actions taken off the queue.
    pub fn process_pending(&mut self) -> usize {
        let _enter = self.span.clone().entered();

        let mut total = 0;
        loop {
            let batch = self.state.shared.actions.take();
            if batch.actions.is_empty() {
                return total;
            }
            total += self.execute(batch);
        }
    }

    /// Closes the action queue and releases whatever is still pending without executing it.
    /// Returns the number of discarded actions.
    pub fn shutdown(&mut self) -> usize {
        let _enter = self.span.clone().entered();

        self.state.shared.actions.close();
        let batch = self.state.shared.actions.take();
        let discarded = self.execute(batch);
        debug!(discarded, "core shut down");
        discarded
    }

    /// Moves the driver onto a dedicated core thread. The thread sleeps until actions arrive
    /// and runs until [`CoreThread::shutdown`].
    pub fn spawn(self) -> Result<CoreThread, CoreError> {
        let shared = Arc::clone(&self.state.shared);
        let handle = thread::Builder::new().name(CORE_THREAD_NAME.to_string()).spawn(move || {
            let mut driver = self;
            driver.run();
            driver
        })?;

        Ok(CoreThread { handle, shared })
    }

    fn run(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();
        info!("core thread started");

        loop {
            let batch = self.state.shared.actions.wait();
            let closed = batch.closed;
            self.execute(batch);

            if closed {
                break;
            }
        }

        info!(
            processed = self.state.shared.stats.actions_processed(),
            discarded = self.state.shared.stats.actions_discarded(),
            "core thread stopped"
        );
    }

    /// Executes a batch. Batches taken from a closed queue are discarded.
    fn execute(&mut self, batch: Batch) -> usize {
        let n = batch.actions.len();
        for action in batch.actions {
            self.state.execute(action, batch.closed);
        }
        n
    }
}

/// A handle to the running core thread.
#[derive(Debug)]
pub struct CoreThread {
    handle: JoinHandle<CoreDriver>,
    shared: Arc<Shared>,
}

impl CoreThread {
    /// Stops the core thread. Actions that were not yet executed are discarded, and actions
    /// enqueued from here on are dropped. Returns the driver for inspection.
    pub fn shutdown(self) -> Result<CoreDriver, CoreError> {
        self.shared.actions.close();
        self.handle.join().map_err(|_| CoreError::CorePanicked)
    }
}
