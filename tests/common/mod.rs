#![allow(dead_code)]

//! Shared helpers for integration tests.

use hookline::testing::TestClient;
use hookline::{App, AppOptions, RuntimeConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Development config, independent of the test process environment.
pub fn dev_config() -> RuntimeConfig {
    RuntimeConfig::default()
}

pub fn prod_config() -> RuntimeConfig {
    RuntimeConfig::default().production(true)
}

/// An application that ignores `HOOKLINE_*` variables.
pub fn app() -> App {
    App::with_options(AppOptions::new().config(dev_config()))
}

pub fn app_with_prefix(prefix: &str) -> App {
    App::with_options(AppOptions::new().prefix(prefix).config(dev_config()))
}

pub fn client(app: App) -> TestClient {
    TestClient::new(app.build().expect("application builds"))
}

/// Shared call counter for hooks and handlers.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
