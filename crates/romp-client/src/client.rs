//! Client construction and name resolution.

use std::sync::Arc;

use tokio::sync::Mutex;

use romp_common::transport;
use romp_common::{Endpoint, Result, Session, RESOLVER_ID};

use crate::proxy::Proxy;

/// A connected romp client.
///
/// One client is one session. All proxies handed out share the session
/// and, in synchronized mode (the default), one conversation lock; any
/// number of callers may use them concurrently.
pub struct Client {
    session: Arc<Session>,
    lock: Option<Arc<Mutex<()>>>,
}

impl Client {
    /// Connects a synchronized client to the endpoint URI.
    pub async fn connect(uri: &str) -> Result<Self> {
        Client::connect_with(uri, true).await
    }

    /// Connects with an explicit synchronization mode. Unsynchronized
    /// clients skip the per-conversation lock; callers from more than one
    /// task will interleave frames and corrupt each other's replies, so
    /// only single-caller setups should turn this on.
    pub async fn connect_with(uri: &str, synchronized: bool) -> Result<Self> {
        let endpoint = Endpoint::parse(uri)?;
        let stream = transport::connect(&endpoint).await?;
        tracing::debug!(%endpoint, "client connected");
        Ok(Client {
            session: Arc::new(Session::new(stream)),
            lock: synchronized.then(|| Arc::new(Mutex::new(()))),
        })
    }

    /// The proxy for the server's well-known name resolver.
    pub fn resolver(&self) -> Proxy {
        self.proxy(RESOLVER_ID)
    }

    /// A proxy for an arbitrary object id. Most callers want
    /// [`resolve`](Client::resolve); this is the low-level door for ids
    /// learned out of band.
    pub fn proxy(&self, object_id: u16) -> Proxy {
        Proxy::new(self.session.clone(), self.lock.clone(), object_id)
    }

    /// Looks a name up in the server's resolver and returns a proxy for
    /// the object bound to it.
    pub async fn resolve(&self, name: &str) -> Result<Proxy> {
        self.resolver()
            .call("resolve", vec![name.into()])
            .await?
            .into_proxy()
    }

    /// Session-level sync round-trip; see [`Proxy::sync`].
    pub async fn sync(&self) -> Result<()> {
        self.resolver().sync().await
    }
}
