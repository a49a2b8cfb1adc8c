use sentry_tracing::SentryLayer;
use tracing::Level;

const SENTRY_DSN_ENV: &str = "SENTRY_DSN";

/// Initialise the sentry client when `SENTRY_DSN` is set.
///
/// The returned guard must live for the duration of the process; dropping it
/// flushes pending events.
pub fn init_once() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var(SENTRY_DSN_ENV).ok().filter(|d| !d.is_empty())?;
    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(
                if cfg!(debug_assertions) {
                    "dev"
                } else {
                    "production"
                }
                .into(),
            ),
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Tracing layer forwarding `error!` events to sentry (warnings and info
/// become breadcrumbs). A no-op when sentry was never initialised.
pub fn sentry_layer<S>() -> SentryLayer<S>
where
    S: tracing::Subscriber,
    S: for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    sentry_tracing::layer()
        .span_filter(|meta| matches!(*meta.level(), Level::ERROR | Level::WARN | Level::INFO))
}
