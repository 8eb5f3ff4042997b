//! Connection to the forwarding engine and its reader thread.
//!
//! A [`Connection`] wraps a [`Transport`]. Requests are sent from the issuing
//! context with a fresh context id and a reply handler registered *before*
//! the send, so a reply that races ahead of `send()` returning still finds
//! its handler. One reader thread per connection pumps inbound messages:
//! replies go to the handler registered for their context, events go to
//! every subscriber.

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use vom_api::{ApiResult, Event, Incoming, Reply, Request, Transport};

/// Whether a reply handler expects more replies for its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Done,
    More,
}

/// Called on the reader thread for each reply to one request.
pub type ReplyHandler = Box<dyn FnMut(Reply) -> Dispatch + Send>;

/// Called on the reader thread for each engine event.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies an event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Timing knobs for a connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Deadline for a single request/reply exchange.
    pub rpc_timeout: Duration,
    /// Deadline for a whole dump to complete.
    pub dump_timeout: Duration,
    /// Pause between failed connect attempts.
    pub connect_retry_interval: Duration,
    /// How long the reader waits on the transport before rechecking shutdown.
    pub reader_poll_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(5),
            dump_timeout: Duration::from_secs(5),
            connect_retry_interval: Duration::from_secs(1),
            reader_poll_interval: Duration::from_millis(50),
        }
    }
}

/// The sending half of a one-shot result.
pub struct Promise<T> {
    tx: Sender<T>,
}

impl<T> Promise<T> {
    /// Fulfills the promise. A second value, or one nobody waits for, is dropped.
    pub fn set(&self, value: T) {
        let _ = self.tx.try_send(value);
    }
}

/// The receiving half of a one-shot result.
pub struct Future<T> {
    rx: Receiver<T>,
}

impl<T> Future<T> {
    /// Blocks until the value arrives or `timeout` passes. `None` on timeout
    /// or if the promise was dropped unfulfilled.
    pub fn wait(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Creates a connected promise/future pair.
pub fn promise<T>() -> (Promise<T>, Future<T>) {
    let (tx, rx) = bounded(1);
    (Promise { tx }, Future { rx })
}

struct Shared {
    transport: Arc<dyn Transport>,
    handlers: Mutex<HashMap<u32, ReplyHandler>>,
    subscribers: Mutex<Vec<(SubscriptionId, EventHandler)>>,
    running: AtomicBool,
}

impl Shared {
    fn dispatch(&self, incoming: Incoming) {
        match incoming {
            Incoming::Reply { context, reply } => {
                let handler = self.handlers.lock().remove(&context);
                match handler {
                    Some(mut handler) => {
                        if handler(reply) == Dispatch::More {
                            self.handlers.lock().insert(context, handler);
                        }
                    }
                    None => debug!("reader: no handler for context {}, dropped", context),
                }
            }
            Incoming::Event(event) => {
                let subscribers: Vec<EventHandler> = self
                    .subscribers
                    .lock()
                    .iter()
                    .map(|(_, h)| Arc::clone(h))
                    .collect();
                for handler in subscribers {
                    handler(&event);
                }
            }
        }
    }

    fn run(&self, poll_interval: Duration) {
        debug!("reader: started");
        while self.running.load(Ordering::Acquire) {
            if let Some(incoming) = self.transport.recv(poll_interval) {
                self.dispatch(incoming);
            }
        }
        debug!("reader: stopped");
    }
}

/// A session with the forwarding engine plus its reader thread.
pub struct Connection {
    shared: Arc<Shared>,
    config: ConnectionConfig,
    next_context: AtomicU32,
    next_subscription: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .field("config", &self.config)
            .finish()
    }
}

impl Connection {
    /// Wraps a transport with the default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, ConnectionConfig::default())
    }

    /// Wraps a transport and starts the reader thread.
    pub fn with_config(transport: Arc<dyn Transport>, config: ConnectionConfig) -> Self {
        let shared = Arc::new(Shared {
            transport,
            handlers: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
        });

        let reader_shared = Arc::clone(&shared);
        let poll_interval = config.reader_poll_interval;
        let reader = thread::Builder::new()
            .name("vom-reader".to_string())
            .spawn(move || reader_shared.run(poll_interval));
        let reader = match reader {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start reader thread: {}", e);
                None
            }
        };

        Self {
            shared,
            config,
            next_context: AtomicU32::new(1),
            next_subscription: AtomicU64::new(1),
            reader: Mutex::new(reader),
        }
    }

    /// Returns the timing configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns true if the transport has a live session.
    pub fn is_connected(&self) -> bool {
        self.shared.transport.is_connected()
    }

    /// Makes one connect attempt.
    pub fn try_connect(&self) -> ApiResult<()> {
        self.shared.transport.connect()
    }

    /// Connects, retrying until the engine accepts. Returns the number of
    /// attempts made.
    pub fn connect(&self) -> usize {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.shared.transport.connect() {
                Ok(()) => {
                    info!("Connected to forwarding engine after {} attempt(s)", attempts);
                    return attempts;
                }
                Err(e) => {
                    warn!(
                        "Connect attempt {} failed: {}; retrying in {:?}",
                        attempts, e, self.config.connect_retry_interval
                    );
                    thread::sleep(self.config.connect_retry_interval);
                }
            }
        }
    }

    /// Closes the session. Outstanding requests are abandoned, which wakes
    /// their waiters immediately.
    pub fn disconnect(&self) {
        self.shared.transport.disconnect();
        let abandoned: Vec<ReplyHandler> = self
            .shared
            .handlers
            .lock()
            .drain()
            .map(|(_, h)| h)
            .collect();
        if !abandoned.is_empty() {
            debug!("disconnect: abandoning {} outstanding request(s)", abandoned.len());
        }
        drop(abandoned);
        info!("Disconnected from forwarding engine");
    }

    /// Sends a request. `handler` runs on the reader thread for each reply.
    /// Returns the context id the request was sent with.
    pub fn request(&self, request: Request, handler: ReplyHandler) -> ApiResult<u32> {
        let context = self.next_context.fetch_add(1, Ordering::Relaxed);
        self.shared.handlers.lock().insert(context, handler);
        if let Err(e) = self.shared.transport.send(context, request) {
            self.shared.handlers.lock().remove(&context);
            return Err(e);
        }
        Ok(context)
    }

    /// Forgets the handler for `context`, e.g. after its waiter gave up.
    pub fn cancel(&self, context: u32) {
        self.shared.handlers.lock().remove(&context);
    }

    /// Registers an event handler.
    pub fn subscribe(&self, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.shared.subscribers.lock().push((id, handler));
        id
    }

    /// Removes an event handler.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.subscribers.lock().retain(|(sid, _)| *sid != id);
    }

    /// Sends `request` and blocks for its single reply.
    pub fn call(&self, request: Request, timeout: Duration) -> Option<Reply> {
        let (promise, future) = promise();
        let context = match self.request(
            request,
            Box::new(move |reply| {
                promise.set(reply);
                Dispatch::Done
            }),
        ) {
            Ok(context) => context,
            Err(e) => {
                warn!("send failed: {}", e);
                return None;
            }
        };
        let reply = future.wait(timeout);
        if reply.is_none() {
            self.cancel(context);
        }
        reply
    }

    /// Sends a dump request and blocks until its terminating status reply.
    /// Returns the status reply's retval and the detail records, or `None` on
    /// timeout.
    pub fn call_dump(&self, request: Request, timeout: Duration) -> Option<(i32, Vec<Reply>)> {
        let (promise, future) = promise();
        let mut details = Vec::new();
        let context = match self.request(
            request,
            Box::new(move |reply| {
                if reply.is_details() {
                    details.push(reply);
                    Dispatch::More
                } else {
                    promise.set((reply.retval(), std::mem::take(&mut details)));
                    Dispatch::Done
                }
            }),
        ) {
            Ok(context) => context,
            Err(e) => {
                warn!("send failed: {}", e);
                return None;
            }
        };
        let result = future.wait(timeout);
        if result.is_none() {
            self.cancel(context);
        }
        result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.reader.lock().take() {
            if handle.join().is_err() {
                error!("reader thread panicked");
            }
        }
    }
}
