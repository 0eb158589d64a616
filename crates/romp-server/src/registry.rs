//! Server-side object registry and the well-known name resolver.
//!
//! The registry maps 16-bit ids to live objects and names to ids. Id 0 is
//! reserved for the [`Resolver`], the object every client talks to first;
//! it is registered at server construction and never released.
//!
//! All operations are atomic under a single mutex. Ids of unregistered
//! objects are not recycled: a stale remote handle must dangle with an
//! unknown-object error, never alias a newer object.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use romp_common::{RemoteError, RompError, Result, Value, RESOLVER_ID};

use crate::object::{no_method, CallResult, RemoteObject, Yielder};

/// One past the largest assignable object id.
const MAX_ID: u32 = 1 << 16;

/// Map from object ids to live objects, plus the name binding table.
pub struct Registry {
    inner: Mutex<Inner>,
}

struct Inner {
    next_id: u32,
    free_ids: BTreeSet<u16>,
    objects: HashMap<u16, Arc<dyn RemoteObject>>,
    names: HashMap<String, u16>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            inner: Mutex::new(Inner {
                next_id: 0,
                free_ids: BTreeSet::new(),
                objects: HashMap::new(),
                names: HashMap::new(),
            }),
        }
    }

    /// Registers an object and assigns it an id. Fresh ids are handed out
    /// first; the free list is consulted only once the id space is
    /// exhausted (nothing feeds it in the base design).
    pub fn register(&self, obj: Arc<dyn RemoteObject>) -> Result<u16> {
        let mut inner = self.inner.lock().unwrap();
        let id = if inner.next_id < MAX_ID {
            let id = inner.next_id as u16;
            inner.next_id += 1;
            id
        } else if let Some(id) = inner.free_ids.pop_first() {
            id
        } else {
            return Err(RompError::ObjectLimit);
        };
        inner.objects.insert(id, obj);
        Ok(id)
    }

    /// Removes an object located by identity. Its id stays burned; see the
    /// module note on recycling.
    pub fn unregister(&self, obj: &Arc<dyn RemoteObject>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let found = inner
            .objects
            .iter()
            .find(|(_, o)| Arc::ptr_eq(o, obj))
            .map(|(id, _)| *id);
        match found {
            Some(id) if id != RESOLVER_ID => {
                inner.objects.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Removes an object by id. The resolver slot is not removable.
    pub fn unregister_id(&self, id: u16) -> bool {
        if id == RESOLVER_ID {
            return false;
        }
        self.inner.lock().unwrap().objects.remove(&id).is_some()
    }

    pub fn get(&self, id: u16) -> Option<Arc<dyn RemoteObject>> {
        self.inner.lock().unwrap().objects.get(&id).cloned()
    }

    /// Binds a name to an id in the resolver table.
    pub fn bind_name(&self, name: &str, id: u16) {
        self.inner
            .lock()
            .unwrap()
            .names
            .insert(name.to_string(), id);
    }

    pub fn resolve_name(&self, name: &str) -> Option<u16> {
        self.inner.lock().unwrap().names.get(name).copied()
    }

    /// Registers an object and hands back the wire value for it, so a
    /// method can return a live object as a remote handle instead of a
    /// by-value copy.
    pub fn create_reference(&self, obj: Arc<dyn RemoteObject>) -> Result<Value> {
        Ok(Value::ObjectRef(self.register(obj)?))
    }

    /// Releases a reference created with [`create_reference`]. Stale
    /// handles held by clients start failing with an unknown-object
    /// exception.
    ///
    /// [`create_reference`]: Registry::create_reference
    pub fn delete_reference(&self, obj: &Arc<dyn RemoteObject>) -> bool {
        self.unregister(obj)
    }

    #[cfg(test)]
    fn exhaust_fresh_ids(&self) {
        self.inner.lock().unwrap().next_id = MAX_ID;
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

/// The object behind id 0.
///
/// Clients bootstrap through it: `resolve(name)` turns a bound name into a
/// remote handle, and `release(id)` drops a reference the server handed
/// out earlier.
pub struct Resolver {
    registry: Arc<Registry>,
}

impl Resolver {
    pub fn new(registry: Arc<Registry>) -> Self {
        Resolver { registry }
    }
}

impl RemoteObject for Resolver {
    fn call(&self, method: &str, args: Vec<Value>, _yielder: Yielder<'_>) -> CallResult {
        match method {
            "resolve" => {
                let name = args.first().and_then(Value::as_str).ok_or_else(|| {
                    RemoteError::new("ArgumentError", "resolve expects a name string")
                })?;
                match self.registry.resolve_name(name) {
                    Some(id) => Ok(Value::ObjectRef(id)),
                    None => Err(RemoteError::new(
                        "NameError",
                        format!("name not bound: {name}"),
                    )),
                }
            }
            "release" => {
                let id = args.first().and_then(Value::as_int).ok_or_else(|| {
                    RemoteError::new("ArgumentError", "release expects an object id")
                })?;
                let id = u16::try_from(id).map_err(|_| {
                    RemoteError::new("ArgumentError", format!("not an object id: {id}"))
                })?;
                if self.registry.unregister_id(id) {
                    Ok(Value::Nil)
                } else {
                    Err(RemoteError::new(
                        "RegistryError",
                        format!("no such object: {id}"),
                    ))
                }
            }
            other => Err(no_method(other)),
        }
    }
}
