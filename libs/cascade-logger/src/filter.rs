use tracing::{subscriber::Interest, Level, Metadata};
use tracing_subscriber::layer::{Context, Filter};

/// Hides framework chatter below `WARN` and the per-statement sql log.
pub struct GeneralFilter {
    max_level: Level,
}

const EXCLUDE_PREFIX: [&str; 5] = ["hyper::", "rustls::", "mio::", "sea_orm::", "sqlx::"];

impl GeneralFilter {
    pub fn new(max_level: Level) -> Self {
        Self { max_level }
    }

    fn is_enabled(&self, metadata: &Metadata<'_>) -> bool {
        let is_framework = EXCLUDE_PREFIX
            .iter()
            .any(|prefix| metadata.target().starts_with(prefix))
            && *metadata.level() > Level::WARN;

        metadata.target() != "sqlx::query" && *metadata.level() <= self.max_level && !is_framework
    }
}

impl<S> Filter<S> for GeneralFilter {
    fn enabled(&self, metadata: &Metadata<'_>, _: &Context<'_, S>) -> bool {
        self.is_enabled(metadata)
    }

    fn callsite_enabled(&self, metadata: &'static Metadata<'static>) -> Interest {
        if self.is_enabled(metadata) {
            Interest::always()
        } else {
            Interest::never()
        }
    }
}
