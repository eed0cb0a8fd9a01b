use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use derivative::Derivative;

use crate::dense_map::DenseMap;

/// What a listener asks the signal to do with its slot after an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Keep,
    Erase,
}

/// Opaque cancellation handle for one subscription.
///
/// A connection wraps nothing but a weak reference to the shared "still
/// connected" flag, so it never keeps the listener alive and releasing is
/// O(1) and idempotent. Connections compare and hash by the identity of the
/// shared flag.
#[derive(Clone, Debug)]
pub struct Connection {
    flag: Weak<AtomicBool>,
}

impl Connection {
    fn new(flag: &Arc<AtomicBool>) -> Self {
        Connection {
            flag: Arc::downgrade(flag),
        }
    }

    /// True while the listener is subscribed and not released.
    pub fn is_connected(&self) -> bool {
        self.flag
            .upgrade()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// Clears the shared flag. The next emission drops the listener without
    /// invoking it. Releasing twice is the same as releasing once.
    pub fn release(&self) {
        if let Some(flag) = self.flag.upgrade() {
            flag.store(false, Ordering::Relaxed);
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Connection) -> bool {
        self.flag.ptr_eq(&other.flag)
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.flag.as_ptr() as usize).hash(state);
    }
}

struct Listener<A> {
    flag: Arc<AtomicBool>,
    call: Box<dyn FnMut(A) -> Outcome>,
}

/// Adapts caller-supplied callables into listeners.
///
/// A `FnMut(A)` listener is kept until released; a `FnMut(A) -> bool`
/// listener keeps itself by returning `true` and unsubscribes by returning
/// `false`. The `Marker` parameter only disambiguates the two blanket
/// impls.
pub trait IntoListener<A, Marker> {
    fn into_listener(self) -> Box<dyn FnMut(A) -> Outcome>;
}

pub enum VoidMarker {}
pub enum BoolMarker {}

impl<A, F> IntoListener<A, VoidMarker> for F
where
    F: FnMut(A) + 'static,
{
    fn into_listener(mut self) -> Box<dyn FnMut(A) -> Outcome> {
        Box::new(move |arg| {
            self(arg);
            Outcome::Keep
        })
    }
}

impl<A, F> IntoListener<A, BoolMarker> for F
where
    F: FnMut(A) -> bool + 'static,
{
    fn into_listener(mut self) -> Box<dyn FnMut(A) -> Outcome> {
        Box::new(move |arg| {
            if self(arg) {
                Outcome::Keep
            } else {
                Outcome::Erase
            }
        })
    }
}

/// Ordered collection of releasable listeners.
///
/// Listeners fire in subscription order (modulo slots recycled by earlier
/// removals). Emission tolerates a listener releasing its own or any other
/// connection mid-flight; it must not mutate the storage being iterated.
#[derive(Derivative)]
#[derivative(Debug, Default(bound = ""))]
pub struct Signal<A> {
    #[derivative(Debug = "ignore")]
    listeners: DenseMap<Connection, Listener<A>>,
}

impl<A: Copy> Signal<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn connect<M>(&mut self, listener: impl IntoListener<A, M>) -> Connection {
        let flag = Arc::new(AtomicBool::new(true));
        let connection = Connection::new(&flag);
        self.listeners.insert(
            connection.clone(),
            Listener {
                flag,
                call: listener.into_listener(),
            },
        );
        connection
    }

    pub fn disconnect(&mut self, connection: &Connection) {
        connection.release();
        self.listeners.remove(connection);
    }

    /// Drops every listener and releases their connections.
    pub fn clear(&mut self) {
        for listener in self.listeners.values() {
            listener.flag.store(false, Ordering::Relaxed);
        }
        self.listeners.clear();
    }

    /// Invokes every live listener with `arg`.
    ///
    /// Entries whose flag was cleared beforehand are dropped without being
    /// invoked; entries that return [`Outcome::Erase`] are released and
    /// dropped. Removal keeps the remaining indices valid because the
    /// backing map erases by swap.
    pub fn emit(&mut self, arg: A) {
        let mut index = 0;
        while index < self.listeners.len() {
            if !self.listeners.entry_at(index).1.flag.load(Ordering::Relaxed) {
                self.listeners.remove_at(index);
                continue;
            }
            match (self.listeners.value_at_mut(index).call)(arg) {
                Outcome::Keep => index += 1,
                Outcome::Erase => {
                    let (_, listener) = self.listeners.remove_at(index);
                    listener.flag.store(false, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn sink(&mut self) -> Sink<'_, A> {
        Sink { signal: self }
    }
}

/// Borrowed subscription surface over one signal.
#[derive(Debug)]
pub struct Sink<'a, A> {
    signal: &'a mut Signal<A>,
}

impl<'a, A: Copy> Sink<'a, A> {
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    pub fn connect<M>(&mut self, listener: impl IntoListener<A, M>) -> Connection {
        self.signal.connect(listener)
    }

    pub fn disconnect(&mut self, connection: &Connection) {
        self.signal.disconnect(connection);
    }

    pub fn clear(&mut self) {
        self.signal.clear();
    }
}
