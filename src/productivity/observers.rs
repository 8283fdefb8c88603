use std::sync::Mutex;

use tracing::error;

/// Handle returned by [Observers::subscribe], used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Synchronous subscriber list. Components call [Observers::notify] after a mutation has been
/// committed to the store. Callbacks must not subscribe or unsubscribe from inside a
/// notification.
pub struct Observers<E> {
    inner: Mutex<ObserverList<E>>,
}

struct ObserverList<E> {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback<E>)>,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(ObserverList {
                next_id: 0,
                callbacks: vec![],
            }),
        }
    }
}

impl<E> Observers<E> {
    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let mut list = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = SubscriptionId(list.next_id);
        list.next_id += 1;
        list.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Returns false when `id` wasn't subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut list = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = list.callbacks.len();
        list.callbacks.retain(|(v, _)| *v != id);
        list.callbacks.len() != before
    }

    pub fn notify(&self, event: &E) {
        let list = match self.inner.lock() {
            Ok(list) => list,
            Err(e) => {
                error!("Observer list poisoned, notifying anyway");
                e.into_inner()
            }
        };
        for (_, callback) in list.callbacks.iter() {
            callback(event);
        }
    }
}
