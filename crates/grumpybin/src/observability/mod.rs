//! Observability for GrumpyBin.
//!
//! Structured logging goes through `tracing` with per-module targets
//! (`grumpybin.store`, `grumpybin.channel`, `grumpybin.activation`,
//! `grumpybin.actuation`). Metrics go through the `metrics` facade and are
//! exported by Prometheus when `METRICS_BIND_ADDRESS` is set.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `grumpybin_commands_total` | Counter | `method`, `status` |
//! | `grumpybin_decode_failures_total` | Counter | none |
//! | `grumpybin_publish_failures_total` | Counter | none |
//! | `grumpybin_store_operations_total` | Counter | `operation`, `status` |
//! | `grumpybin_store_latency_seconds` | Histogram | `operation` |
//! | `grumpybin_activations_total` | Counter | `outcome` |
//! | `grumpybin_actuation_errors_total` | Counter | `kind` |
//! | `grumpybin_actuation_duration_seconds` | Histogram | `cancelled` |

pub mod metrics;
