//! Process-wide tracing subscriber.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

/// Directives used when `RUST_LOG` is unset.
fn default_directives(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "procurement_backend=debug,tower_http=debug,sqlx=warn,info",
        Environment::Staging => "procurement_backend=debug,tower_http=info,sqlx=warn,info",
        Environment::Prod => "procurement_backend=info,tower_http=info,sqlx=error,warn",
    }
}

fn filter_for(env: &Environment) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(env)))
}

/// Installs the global subscriber: JSON lines in prod, pretty output
/// elsewhere. A second call is a no-op.
pub fn init_logging(env: &Environment) {
    let fmt = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    let installed = if env.is_prod() {
        tracing_subscriber::registry()
            .with(filter_for(env))
            .with(fmt.json().flatten_event(true).with_current_span(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter_for(env))
            .with(fmt.pretty())
            .try_init()
    };

    match installed {
        Ok(()) => tracing::info!(env = ?env, "Logging initialized"),
        Err(err) => tracing::debug!(error = %err, "Subscriber already installed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for env in [Environment::Dev, Environment::Staging, Environment::Prod] {
            let directives = default_directives(&env);
            assert!(directives.starts_with("procurement_backend="));
            assert!(EnvFilter::try_new(directives).is_ok(), "{directives}");
        }
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging(&Environment::Dev);
        init_logging(&Environment::Dev);
    }
}
