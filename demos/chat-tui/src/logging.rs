//! Log filter that follows the widget's `debug` flag.

use std::{fs::File, path::Path};

use anyhow::Context;
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

fn filter(debug: bool) -> EnvFilter {
    EnvFilter::new(if debug { "debug" } else { "info" })
}

/// Handle on the installed filter.
///
/// An explicit `RUST_LOG` pins the filter; the flag is then only recorded.
pub struct LogLevel {
    handle: reload::Handle<EnvFilter, Registry>,
    debug: bool,
    pinned: bool,
}

impl LogLevel {
    /// Install a subscriber writing to `path`.
    pub fn init(path: &Path) -> anyhow::Result<Self> {
        let log = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let (env, pinned) = match EnvFilter::try_from_default_env() {
            Ok(env) => (env, true),
            Err(_) => (filter(false), false),
        };
        let (layer, handle) = reload::Layer::new(env);
        tracing_subscriber::registry()
            .with(layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(log)),
            )
            .init();
        Ok(Self {
            handle,
            debug: false,
            pinned,
        })
    }

    /// Apply `debug`. Returns whether the level changed.
    pub fn set_debug(&mut self, debug: bool) -> bool {
        if debug == self.debug {
            return false;
        }
        self.debug = debug;
        if self.pinned {
            return false;
        }
        if let Err(e) = self.handle.reload(filter(debug)) {
            tracing::warn!("failed to change log level: {e}");
            return false;
        }
        tracing::info!(debug = self.debug, "log level changed");
        true
    }
}
