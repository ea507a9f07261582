//! Provide tracing, tailored to this program.
//!
//! Binaries call one of the init_* functions at startup to install a
//! tracing subscriber. Library code uses `use crate::tracing::prelude::*`
//! for the `trace!()`, `debug!()`, `info!()`, `warn!()` and `error!()`
//! macros.
//!
//! Frame hex dumps are logged at TRACE (bridge frames) and DEBUG (PSU
//! packets), so `RUST_LOG=bitcrane=trace` is the equivalent of a debug
//! switch on the wire traffic.

use std::env;
use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Initialize logging.
///
/// If running under systemd, use journald; otherwise fall back to stdout
/// at INFO.
pub fn init_journald_or_stdout() {
    init_with_default(LevelFilter::INFO);
}

/// Like [`init_journald_or_stdout`], but with a caller-chosen default level
/// for stdout. `RUST_LOG` still takes precedence.
pub fn init_with_default(default_level: LevelFilter) {
    if env::var("JOURNAL_STREAM").is_ok() {
        if let Ok(layer) = tracing_journald::layer() {
            tracing_subscriber::registry().with(layer).init();
            return;
        }
        use_stdout(default_level);
        error!("Failed to initialize journald logging, using stdout.");
    } else {
        use_stdout(default_level);
    }
}

fn use_stdout(default_level: LevelFilter) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTimer))
        .init();
}

// Timestamps in local time, to the millisecond. Bench sessions are short
// and the wire timing matters more than the date.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or(OffsetDateTime::now_utc());
        let stamp = now
            .format(time::macros::format_description!(
                "[hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{}", stamp)
    }
}
