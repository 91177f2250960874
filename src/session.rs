//! Cookie session state shared across requests of one harness instance.

use cookie::Cookie;
use itertools::Itertools;
use std::{collections::HashMap, sync::Mutex};

/// Named-cookie collection propagated across requests.
///
/// Every cookie observed in a response is kept for the lifetime of the
/// harness instance and replayed on each subsequent request; a later cookie
/// with the same name overwrites the earlier one. Expiry attributes are
/// stored but never evicted, matching the single-test-run scope. Interior
/// mutability keeps the store usable from concurrently running cases.
#[derive(Debug, Default)]
pub struct SessionStore {
    jar: Mutex<HashMap<String, Cookie<'static>>>,
}

impl SessionStore {
    pub fn new() -> SessionStore {
        SessionStore::default()
    }

    /// Insert a cookie, overwriting any existing entry of the same name.
    pub fn put(&self, cookie: Cookie<'static>) {
        let mut jar = self.jar.lock().expect("session store lock poisoned");
        jar.insert(cookie.name().to_string(), cookie);
    }

    pub fn get(&self, name: &str) -> Option<Cookie<'static>> {
        let jar = self.jar.lock().expect("session store lock poisoned");
        jar.get(name).cloned()
    }

    /// Snapshot of all cookies, sorted by name for deterministic output.
    pub fn all(&self) -> Vec<Cookie<'static>> {
        let jar = self.jar.lock().expect("session store lock poisoned");
        jar.values()
            .cloned()
            .sorted_by(|a, b| a.name().cmp(b.name()))
            .collect()
    }

    /// `Cookie` request header value for the current snapshot, or `None`
    /// when the store is empty.
    pub fn cookie_header(&self) -> Option<String> {
        let cookies = self.all();
        if cookies.is_empty() {
            return None;
        }

        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name(), c.value()))
                .join("; "),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.jar.lock().expect("session store lock poisoned").is_empty()
    }
}
