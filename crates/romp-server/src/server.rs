//! Server front-end: construction, object binding, the acceptor task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use romp_common::transport::{self, Peer};
use romp_common::{Endpoint, Result, Session, Value};

use crate::dispatch;
use crate::object::RemoteObject;
use crate::registry::{Registry, Resolver};

/// Predicate consulted for every accepted peer; `false` closes the
/// connection before any frame is read.
pub type AcceptPredicate = dyn Fn(&Peer) -> bool + Send + Sync;

/// A romp server.
///
/// Construction parses the endpoint URI and installs the name resolver at
/// object id 0. Application objects are registered and bound before (or
/// after) [`start`](Server::start); the registry is shared with the
/// acceptor, so bindings take effect immediately.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use romp_server::{CallResult, RemoteObject, Server, Yielder};
/// use romp_common::Value;
///
/// struct Echo;
///
/// impl RemoteObject for Echo {
///     fn call(&self, _method: &str, mut args: Vec<Value>, _yielder: Yielder<'_>) -> CallResult {
///         Ok(args.pop().unwrap_or(Value::Nil))
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> romp_common::Result<()> {
///     let server = Server::new("tcpromp://127.0.0.1:4242")?;
///     server.bind(Arc::new(Echo), "echo")?;
///     let handle = server.start().await?;
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct Server {
    endpoint: Endpoint,
    registry: Arc<Registry>,
    acceptor: Option<Arc<AcceptPredicate>>,
    debug: bool,
}

impl Server {
    /// Parses the endpoint URI and sets up a registry with the resolver in
    /// slot 0. A bad URI fails here, synchronously.
    pub fn new(uri: &str) -> Result<Self> {
        let endpoint = Endpoint::parse(uri)?;
        let registry = Arc::new(Registry::new());
        let resolver = Arc::new(Resolver::new(registry.clone()));
        let resolver_id = registry.register(resolver)?;
        debug_assert_eq!(resolver_id, romp_common::RESOLVER_ID);
        Ok(Server {
            endpoint,
            registry,
            acceptor: None,
            debug: false,
        })
    }

    /// Installs a predicate deciding which peers may connect.
    pub fn with_acceptor(mut self, predicate: impl Fn(&Peer) -> bool + Send + Sync + 'static) -> Self {
        self.acceptor = Some(Arc::new(predicate));
        self
    }

    /// Debug mode logs application errors raised by one-way calls, which
    /// are otherwise discarded.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The shared registry, for application code that registers and
    /// releases references at call time.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Registers an object and binds it to a name resolvable by clients.
    pub fn bind(&self, obj: Arc<dyn RemoteObject>, name: &str) -> Result<u16> {
        let id = self.registry.register(obj)?;
        self.registry.bind_name(name, id);
        Ok(id)
    }

    /// Registers an object and returns the wire value referencing it; see
    /// [`Registry::create_reference`].
    pub fn create_reference(&self, obj: Arc<dyn RemoteObject>) -> Result<Value> {
        self.registry.create_reference(obj)
    }

    /// Releases a reference; see [`Registry::delete_reference`].
    pub fn delete_reference(&self, obj: &Arc<dyn RemoteObject>) -> bool {
        self.registry.delete_reference(obj)
    }

    /// Binds the listener and spawns the acceptor task: one task accepting
    /// peers, one dispatch task per live connection.
    pub async fn start(self) -> Result<ServerHandle> {
        let acceptor = transport::listen(&self.endpoint).await?;
        let local_addr = acceptor.local_addr();
        tracing::info!(endpoint = %self.endpoint, "server listening");

        let registry = self.registry;
        let predicate = self.acceptor;
        let debug = self.debug;

        let task = tokio::spawn(async move {
            loop {
                let (stream, peer) = match acceptor.accept().await {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed, stopping acceptor");
                        break;
                    }
                };
                if let Some(predicate) = &predicate {
                    if !predicate(&peer) {
                        tracing::info!(%peer, "peer rejected by accept predicate");
                        continue;
                    }
                }
                tracing::debug!(%peer, "connection established");
                let registry = registry.clone();
                tokio::spawn(async move {
                    dispatch::run_session(Session::new(stream), registry, debug).await;
                    tracing::debug!(%peer, "session closed");
                });
            }
        });

        Ok(ServerHandle { local_addr, task })
    }
}

/// Handle to a started server. Dropping it stops the acceptor; sessions
/// already running end with their peers.
pub struct ServerHandle {
    local_addr: Option<SocketAddr>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The bound socket address, when the transport has one. Useful after
    /// listening on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stops accepting new connections.
    pub fn shutdown(&self) {
        self.task.abort();
    }

    /// Runs until the acceptor stops.
    pub async fn wait(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
