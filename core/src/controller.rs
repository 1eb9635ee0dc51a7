use crate::cycle::PhaseCycle;
use crate::{ShutdownSignal, SignalError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use traffic_signals::{BlockingQueue, Phase, SignalConfig};

/// A single traffic signal cycling between red and green on a background
/// thread.
///
/// Phase changes are published through a [`BlockingQueue`]; threads that need
/// to proceed on green block in [`wait_for_green`](Self::wait_for_green)
/// rather than polling [`current_phase`](Self::current_phase).
pub struct SignalController {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// A published transition, tagged with its position in the sequence of
/// phase changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PhaseChange {
    generation: u64,
    phase: Phase,
}

/// Bookkeeping for threads inside `wait_for_green`.
#[derive(Debug, Default)]
struct Registry {
    waiters: usize,
    /// Generation of the last published transition
    generation: u64,
    /// Copies sent but not yet taken off the queue
    outstanding: usize,
}

/// State shared with the cycle thread
struct Shared {
    config: SignalConfig,
    /// Written only by the cycle thread
    phase: AtomicU8,
    queue: BlockingQueue<PhaseChange>,
    registry: Mutex<Registry>,
    /// Signalled when `outstanding` drops to zero
    drained: Condvar,
    transitions: AtomicU64,
    started: AtomicBool,
    shutdown: ShutdownSignal,
}

impl SignalController {
    pub fn new(config: SignalConfig) -> Result<Self, SignalError> {
        Self::with_shutdown(config, ShutdownSignal::new())
    }

    /// Build a controller whose cycle loop also stops when `shutdown` fires.
    pub fn with_shutdown(
        config: SignalConfig,
        shutdown: ShutdownSignal,
    ) -> Result<Self, SignalError> {
        config.validate()?;
        Ok(Self::from_parts(config, shutdown))
    }

    /// Controller with the 4-6 s cycle and 1 ms tick.
    pub fn with_defaults() -> Self {
        Self::from_parts(SignalConfig::default(), ShutdownSignal::new())
    }

    fn from_parts(config: SignalConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                phase: AtomicU8::new(Phase::Red.as_u8()),
                queue: BlockingQueue::new(),
                registry: Mutex::new(Registry::default()),
                drained: Condvar::new(),
                transitions: AtomicU64::new(0),
                started: AtomicBool::new(false),
                shutdown,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.shared.config
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shared.shutdown.clone()
    }

    /// Lock-free read of the phase last written by the cycle loop.
    pub fn current_phase(&self) -> Phase {
        self.shared.current_phase()
    }

    /// Number of phase changes so far.
    pub fn transitions(&self) -> u64 {
        self.shared.transitions.load(Ordering::Acquire)
    }

    /// Whether the cycle thread is alive.
    pub fn is_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Launch the cycle loop on its own thread. Allowed once per controller.
    pub fn start(&self) -> Result<(), SignalError> {
        if self.shared.shutdown.is_shutdown() {
            return Err(SignalError::Shutdown);
        }
        if self
            .shared
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SignalError::AlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        let cycle = PhaseCycle::new(&shared.config);
        let spawned = thread::Builder::new()
            .name("signal-cycle".to_string())
            .spawn(move || shared.run_cycle(cycle));

        match spawned {
            Ok(handle) => {
                *self.lock_worker() = Some(handle);
                log::info!(
                    "Signal cycle started ({}..{} ms, tick {} ms)",
                    self.shared.config.min_cycle_ms,
                    self.shared.config.max_cycle_ms,
                    self.shared.config.tick_ms
                );
                Ok(())
            }
            Err(e) => {
                self.shared.started.store(false, Ordering::Release);
                Err(SignalError::Spawn(e))
            }
        }
    }

    /// Block until this thread observes the next switch to green.
    ///
    /// Only transitions published after the call began count; red messages
    /// received meanwhile are discarded. Without a shutdown this waits as long
    /// as it takes; after [`shutdown`](Self::shutdown) it returns
    /// [`SignalError::Shutdown`].
    pub fn wait_for_green(&self) -> Result<(), SignalError> {
        let registration = self.shared.register();
        loop {
            let change = self
                .shared
                .queue
                .receive_until_closed()
                .ok_or(SignalError::Shutdown)?;
            self.shared.mark_taken();

            if change.generation > registration.entry && change.phase.is_green() {
                return Ok(());
            }
        }
    }

    /// Stop the cycle loop, release every blocked waiter and join the cycle
    /// thread. Calling it again is a no-op.
    pub fn shutdown(&self) {
        self.shared.shutdown.shutdown();
        self.shared.queue.close();

        let handle = self.lock_worker().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Signal cycle thread panicked");
            }
        }
    }
}

impl Drop for SignalController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SignalController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalController")
            .field("phase", &self.current_phase())
            .field("transitions", &self.transitions())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl Shared {
    fn current_phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_cycle(&self, mut cycle: PhaseCycle) {
        let tick = self.config.tick();
        let mut last = Instant::now();
        log::debug!("First phase lasts {:?}", cycle.threshold());

        while !self.shutdown.wait_timeout(tick) {
            let now = Instant::now();
            let elapsed = now.duration_since(last);
            last = now;

            if cycle.advance(elapsed) {
                let next = self.current_phase().toggled();
                self.phase.store(next.as_u8(), Ordering::Release);
                let count = self.transitions.fetch_add(1, Ordering::AcqRel) + 1;
                let delivered = self.publish(next, count);
                log::debug!(
                    "Signal switched to {} (#{}, {} waiter(s), next in {:?})",
                    next,
                    count,
                    delivered,
                    cycle.threshold()
                );
            }
        }

        self.queue.close();
        log::info!(
            "Signal cycle stopped after {} transitions",
            self.transitions.load(Ordering::Acquire)
        );
    }

    /// One message per registered waiter: each `send` wakes a single
    /// receiver, so this is what lets every waiter see the transition.
    ///
    /// Runs under the registry lock, so the set of waiters a transition is
    /// addressed to is exactly the set registered before it.
    fn publish(&self, phase: Phase, generation: u64) -> usize {
        let mut registry = self.lock_registry();
        registry.generation = generation;
        let waiters = registry.waiters;
        for _ in 0..waiters {
            self.queue.send(PhaseChange { generation, phase });
        }
        registry.outstanding += waiters;
        waiters
    }

    /// Join the waiter set once every copy addressed to the current set has
    /// been taken, so a newcomer cannot pop a message meant for someone else.
    fn register(&self) -> WaiterRegistration<'_> {
        let mut registry = self.lock_registry();
        while registry.outstanding > 0 {
            registry = self
                .drained
                .wait(registry)
                .unwrap_or_else(PoisonError::into_inner);
        }
        registry.waiters += 1;
        WaiterRegistration {
            shared: self,
            entry: registry.generation,
        }
    }

    fn mark_taken(&self) {
        let mut registry = self.lock_registry();
        registry.outstanding = registry.outstanding.saturating_sub(1);
        if registry.outstanding == 0 {
            self.drained.notify_all();
        }
    }

    fn unregister(&self) {
        let mut registry = self.lock_registry();
        registry.waiters -= 1;
        if registry.waiters == 0 && registry.outstanding > 0 {
            // Nobody is left to take these; drop them so the next waiter can join.
            while self.queue.try_receive().is_some() {}
            registry.outstanding = 0;
            self.drained.notify_all();
        }
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.lock_registry().waiters
    }
}

/// Membership in the waiter set for the duration of one `wait_for_green`.
struct WaiterRegistration<'a> {
    shared: &'a Shared,
    /// Generation current when the waiter joined; only later ones count
    entry: u64,
}

impl Drop for WaiterRegistration<'_> {
    fn drop(&mut self) {
        self.shared.unregister();
    }
}
