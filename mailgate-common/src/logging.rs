use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Install the global subscriber.
///
/// `configured` is the `[logger] level` from the configuration file; the
/// `LOG_LEVEL` environment variable overrides it, and anything unparseable
/// falls back with a note on stderr rather than failing boot.
pub fn init(configured: &str) {
    let default = LevelFilter::from_str(configured).unwrap_or_else(|_| {
        eprintln!("Invalid log level configured {configured}, defaulting to INFO");
        LevelFilter::INFO
    });

    let level = std::env::var("LOG_LEVEL").map_or(default, |level| {
        LevelFilter::from_str(level.as_str()).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    });

    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("mailgate")
                })),
        )
        .init();
}
