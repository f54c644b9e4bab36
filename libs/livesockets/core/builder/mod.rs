pub mod states;

use crate::client::ConnectionManager;
use crate::config::ConnectionOptions;
use crate::core::dispatch::Callbacks;
use crate::core::ws_transport::WsTransport;
use crate::connection_state::ConnectionStatusEvent;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Type-state builder for ConnectionManager
///
/// The URL is required and enforced at compile time; everything else
/// falls back to the [`ConnectionOptions`] defaults.
pub struct ConnectionManagerBuilder<U>
where
    U: UrlState,
{
    _state: TypeState<U>,
    options: ConnectionOptions,
    transport: Option<Arc<dyn Transport>>,
    headers: Option<Arc<dyn HeaderProvider>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    callbacks: Callbacks,
    runtime: Option<Handle>,
}

impl ConnectionManagerBuilder<NoUrl> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            options: ConnectionOptions::new(String::new()),
            transport: None,
            headers: None,
            reconnect_strategy: None,
            callbacks: Callbacks::default(),
            runtime: None,
        }
    }

    /// Set the URL, keeping everything configured so far
    pub fn url(mut self, url: impl Into<String>) -> ConnectionManagerBuilder<HasUrl> {
        self.options.url = url.into();
        self.into_has_url()
    }

    /// Start from a complete options struct, e.g. one loaded from YAML
    pub fn options(mut self, options: ConnectionOptions) -> ConnectionManagerBuilder<HasUrl> {
        self.options = options;
        self.into_has_url()
    }

    fn into_has_url(self) -> ConnectionManagerBuilder<HasUrl> {
        let Self {
            options,
            transport,
            headers,
            reconnect_strategy,
            callbacks,
            runtime,
            ..
        } = self;

        ConnectionManagerBuilder {
            _state: TypeState::new(),
            options,
            transport,
            headers,
            reconnect_strategy,
            callbacks,
            runtime,
        }
    }
}

impl Default for ConnectionManagerBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> ConnectionManagerBuilder<U>
where
    U: UrlState,
{
    /// Replace the WebSocket transport (tests use an in-memory one)
    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Handshake headers for the default WebSocket transport
    pub fn headers<H>(mut self, headers: H) -> Self
    where
        H: HeaderProvider + 'static,
    {
        self.headers = Some(Arc::new(headers));
        self
    }

    /// Override the strategy derived from the options
    pub fn reconnect_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ReconnectionStrategy + 'static,
    {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.options.token = Some(token.into());
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.options.max_reconnect_attempts = attempts;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.options.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.options.max_reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn use_exponential_backoff(mut self, enabled: bool) -> Self {
        self.options.use_exponential_backoff = enabled;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.options.auto_reconnect = enabled;
        self
    }

    pub fn rejoin_session_on_reconnect(mut self, enabled: bool) -> Self {
        self.options.rejoin_session_on_reconnect = enabled;
        self
    }

    /// Heartbeat period and the missed-beat threshold
    pub fn heartbeat(mut self, interval: Duration, max_missed: u32) -> Self {
        self.options.heartbeat_interval_ms = interval.as_millis() as u64;
        self.options.max_missed_heartbeats = max_missed;
        self
    }

    /// Runtime for timers and connection tasks; defaults to the current one
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn on_connect<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_connect = Some(Arc::new(callback));
        self
    }

    pub fn on_disconnect<F>(mut self, callback: F) -> Self
    where
        F: Fn(u16, &str) + Send + Sync + 'static,
    {
        self.callbacks.on_disconnect = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Arc::new(callback));
        self
    }

    /// Receives every inbound message after the per-type listeners
    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        self.callbacks.on_message = Some(Arc::new(callback));
        self
    }

    pub fn on_status_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConnectionStatusEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_status_change = Some(Arc::new(callback));
        self
    }
}

impl ConnectionManagerBuilder<HasUrl> {
    /// Build the manager
    ///
    /// Does not connect; call `connect()` or just `send()`.
    pub fn build(self) -> Result<ConnectionManager> {
        self.options
            .validate()
            .map_err(|e| LiveSocketError::Configuration(e.to_string()))?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                LiveSocketError::Runtime(format!("build() needs a Tokio runtime: {}", e))
            })?,
        };

        let strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| self.options.reconnection_strategy());

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let mut ws = WsTransport::new().with_runtime(runtime.clone());
                if let Some(headers) = self.headers {
                    ws = ws.with_headers(headers);
                }
                Arc::new(ws)
            }
        };

        Ok(ConnectionManager::new(
            self.options,
            strategy,
            transport,
            self.callbacks,
            runtime,
        ))
    }
}
