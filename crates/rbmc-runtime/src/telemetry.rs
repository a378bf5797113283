//! Log output and span export for `rbmc-cfamd`.
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter, `info` when unset. |
//! | `RBMC_LOG_FORMAT=json` | One JSON object per line instead of compact text. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | Also export spans over OTLP/HTTP to this collector. |
//!
//! Both BMCs of a pair usually report to the same collector, so exported
//! spans carry a [`BmcIdentity`] resource telling them apart.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Which half of the pair is emitting spans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BmcIdentity {
    pub bmc_position: u8,
    pub local_link: usize,
    pub sibling_link: usize,
}

impl BmcIdentity {
    fn attributes(&self) -> [KeyValue; 3] {
        [
            KeyValue::new("rbmc.bmc_position", i64::from(self.bmc_position)),
            KeyValue::new("rbmc.local_link", self.local_link as i64),
            KeyValue::new("rbmc.sibling_link", self.sibling_link as i64),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Anything but `json` (any case) selects compact text.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Compact
        }
    }

    fn from_env() -> Self {
        std::env::var("RBMC_LOG_FORMAT")
            .map(|raw| Self::parse(&raw))
            .unwrap_or_default()
    }
}

/// Install the global subscriber.  Call once, before anything logs.
///
/// `identity` is `None` when the config could not be loaded; spans are then
/// exported with the service name only.  Keep the returned guard alive until
/// exit so buffered spans are flushed.
pub fn init_tracing(service_name: &str, identity: Option<BmcIdentity>) -> TracerProviderGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let provider = build_provider(service_name, identity);
    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(service_name.to_owned())));

    let (json, compact) = match LogFormat::from_env() {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Compact => (None, Some(tracing_subscriber::fmt::layer().compact())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(otel)
        .with(json)
        .with(compact)
        .init();

    TracerProviderGuard(provider)
}

/// Flushes and shuts down the span exporter on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        let Some(provider) = self.0.take() else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            eprintln!("rbmc-cfamd: span exporter shutdown failed: {e}");
        }
    }
}

/// `None` unless `OTEL_EXPORTER_OTLP_ENDPOINT` is set.  Exporter errors go to
/// stderr; the subscriber does not exist yet.
fn build_provider(service_name: &str, identity: Option<BmcIdentity>) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("rbmc-cfamd: OTLP exporter unavailable: {e}"))
        .ok()?;

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource(service_name, identity))
            // The daemon emits a handful of spans per tick; export inline.
            .with_simple_exporter(exporter)
            .build(),
    )
}

fn resource(service_name: &str, identity: Option<BmcIdentity>) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_owned())
        .with_attributes(identity.map(|id| id.attributes()).into_iter().flatten())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::{Key, Value};

    #[test]
    fn log_format_accepts_json_only() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON\n"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Compact);
        assert_eq!(LogFormat::parse(""), LogFormat::Compact);
    }

    #[test]
    fn resource_identifies_the_bmc() {
        let identity = BmcIdentity {
            bmc_position: 1,
            local_link: 0,
            sibling_link: 1,
        };
        let res = resource("rbmc-cfamd", Some(identity));
        assert_eq!(res.get(&Key::new("rbmc.bmc_position")), Some(Value::I64(1)));
        assert_eq!(res.get(&Key::new("rbmc.sibling_link")), Some(Value::I64(1)));
        assert_eq!(
            res.get(&Key::new("service.name")),
            Some(Value::from("rbmc-cfamd"))
        );

        let bare = resource("rbmc-cfamd", None);
        assert_eq!(bare.get(&Key::new("rbmc.bmc_position")), None);
    }

    #[test]
    fn no_provider_without_endpoint() {
        // SAFETY: no other test in this crate touches this variable.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        assert!(build_provider("rbmc-test", None).is_none());
    }
}
