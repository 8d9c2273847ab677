//! Test logging setup
//!
//! Installs a fmt subscriber writing through the libtest capture buffer so
//! tracing output shows up next to failing assertions. Safe to call from
//! every test; only the first call installs.

use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}
