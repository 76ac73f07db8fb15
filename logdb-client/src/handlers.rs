//! Consumer hooks.
//!
//! Three hooks exist: `event` (one call per newly dispatched event),
//! `response` (one call per non-empty fetched batch) and `fail` (called when
//! the `event` hook fails). Each hook holds at most one callback; registering
//! again replaces the previous one.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::types::{EventContext, ReceivedEvent};

/// Failure reported by an `event` hook.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of an `event` hook.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Callback for the `event` hook.
pub type EventHandler = Arc<dyn Fn(EventContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Callback for the `response` hook.
pub type ResponseHandler = Arc<dyn Fn(Vec<ReceivedEvent>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Callback for the `fail` hook.
pub type FailHandler =
    Arc<dyn Fn(HandlerError, EventContext) -> BoxFuture<'static, ()> + Send + Sync>;

/// The hook names a consumer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Event,
    Response,
    Fail,
}

impl Hook {
    /// All hooks.
    pub const ALL: [Hook; 3] = [Hook::Response, Hook::Event, Hook::Fail];

    /// Wire-style name of the hook.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::Event => "event",
            Hook::Response => "response",
            Hook::Fail => "fail",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a hook name that is not `event`, `response` or `fail`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hook: {0} (expected event, response or fail)")]
pub struct UnknownHook(pub String);

impl FromStr for Hook {
    type Err = UnknownHook;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "event" => Ok(Hook::Event),
            "response" => Ok(Hook::Response),
            "fail" => Ok(Hook::Fail),
            other => Err(UnknownHook(other.to_string())),
        }
    }
}

/// A callback tagged with the hook it belongs to.
#[derive(Clone)]
pub enum Handler {
    Event(EventHandler),
    Response(ResponseHandler),
    Fail(FailHandler),
}

impl Handler {
    /// Wrap an async closure as an `event` hook.
    pub fn event<F, Fut>(f: F) -> Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Handler::Event(Arc::new(move |ctx| f(ctx).boxed()))
    }

    /// Wrap an async closure as a `response` hook.
    pub fn response<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<ReceivedEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Handler::Response(Arc::new(move |batch| f(batch).boxed()))
    }

    /// Wrap an async closure as a `fail` hook.
    pub fn fail<F, Fut>(f: F) -> Self
    where
        F: Fn(HandlerError, EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Handler::Fail(Arc::new(move |err, ctx| f(err, ctx).boxed()))
    }

    /// The hook this callback registers under.
    #[must_use]
    pub fn hook(&self) -> Hook {
        match self {
            Handler::Event(_) => Hook::Event,
            Handler::Response(_) => Hook::Response,
            Handler::Fail(_) => Hook::Fail,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({})", self.hook())
    }
}

/// The set of registered hooks.
#[derive(Clone, Default)]
pub struct Handlers {
    event: Option<EventHandler>,
    response: Option<ResponseHandler>,
    fail: Option<FailHandler>,
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("event", &self.event.is_some())
            .field("response", &self.response.is_some())
            .field("fail", &self.fail.is_some())
            .finish()
    }
}

impl Handlers {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback, replacing any previous one for the same hook.
    pub fn on(&mut self, handler: Handler) {
        match handler {
            Handler::Event(h) => self.event = Some(h),
            Handler::Response(h) => self.response = Some(h),
            Handler::Fail(h) => self.fail = Some(h),
        }
    }

    /// Register the `event` hook.
    pub fn on_event<F, Fut>(&mut self, f: F)
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Handler::event(f));
    }

    /// Register the `response` hook.
    pub fn on_response<F, Fut>(&mut self, f: F)
    where
        F: Fn(Vec<ReceivedEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(Handler::response(f));
    }

    /// Register the `fail` hook.
    pub fn on_fail<F, Fut>(&mut self, f: F)
    where
        F: Fn(HandlerError, EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(Handler::fail(f));
    }

    /// Unregister a hook.
    pub fn remove(&mut self, hook: Hook) {
        match hook {
            Hook::Event => self.event = None,
            Hook::Response => self.response = None,
            Hook::Fail => self.fail = None,
        }
    }

    /// Whether a callback is registered for `hook`.
    #[must_use]
    pub fn is_registered(&self, hook: Hook) -> bool {
        match hook {
            Hook::Event => self.event.is_some(),
            Hook::Response => self.response.is_some(),
            Hook::Fail => self.fail.is_some(),
        }
    }

    /// Run the `response` hook, if any. Panics are logged and absorbed.
    pub(crate) async fn notify_response(&self, batch: &[ReceivedEvent]) {
        let Some(handler) = &self.response else {
            return;
        };
        let batch = batch.to_vec();
        if let Err(panic) = AssertUnwindSafe(async move { handler(batch).await })
            .catch_unwind()
            .await
        {
            tracing::error!(panic = %panic_message(&*panic), "Response hook panicked");
        }
    }

    /// Run the `event` hook. Returns `None` when no hook is registered.
    ///
    /// A panic inside the hook is reported as a failure.
    pub(crate) async fn handle_event(&self, ctx: EventContext) -> Option<HandlerResult> {
        let handler = self.event.as_ref()?;
        let outcome = AssertUnwindSafe(async move { handler(ctx).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(format!("event hook panicked: {}", panic_message(&*panic)).into())
            });
        Some(outcome)
    }

    /// Run the `fail` hook. Returns whether one was registered.
    pub(crate) async fn notify_fail(&self, error: HandlerError, ctx: EventContext) -> bool {
        let Some(handler) = &self.fail else {
            return false;
        };
        let id = ctx.id;
        if let Err(panic) = AssertUnwindSafe(async move { handler(error, ctx).await })
            .catch_unwind()
            .await
        {
            tracing::error!(event_id = id, panic = %panic_message(&*panic), "Fail hook panicked");
        }
        true
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
