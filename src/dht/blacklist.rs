use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

type BanKey = (IpAddr, Option<u16>);

struct Inner {
    entries: HashMap<BanKey, Instant>,
    order: VecDeque<BanKey>,
}

/// A bounded LRU of misbehaving remotes.
///
/// An entry with `port: None` bans the whole host. When the list is full,
/// the oldest entry is evicted; entries also age out after `ttl`.
pub struct BlackList {
    max: usize,
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl BlackList {
    pub fn new(max: usize, ttl: Duration) -> Self {
        Self {
            max: max.max(1),
            ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Bans `(ip, port)`; `None` port bans every port of the host.
    pub fn insert(&self, ip: IpAddr, port: Option<u16>) {
        let key = (ip, port);
        let mut inner = self.inner.lock();

        if inner.entries.insert(key, Instant::now()).is_some() {
            return;
        }

        inner.order.push_back(key);

        while inner.entries.len() > self.max {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
    }

    /// Whether packets from `(ip, port)` should be refused.
    pub fn contains(&self, ip: IpAddr, port: u16) -> bool {
        let inner = self.inner.lock();

        for key in [(ip, None), (ip, Some(port))] {
            if let Some(at) = inner.entries.get(&key) {
                if at.elapsed() <= self.ttl {
                    return true;
                }
            }
        }

        false
    }

    /// Drops entries past their lifetime.
    pub fn sweep(&self) {
        let ttl = self.ttl;
        let mut inner = self.inner.lock();
        inner.entries.retain(|_, at| at.elapsed() <= ttl);
        let entries = std::mem::take(&mut inner.entries);
        inner.order.retain(|key| entries.contains_key(key));
        inner.entries = entries;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
