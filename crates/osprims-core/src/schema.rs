//! Schema ID constants for JSON output contracts.
//!
//! All osprims JSON outputs include a `schema_id` field that references
//! the corresponding schema. These constants define the canonical schema URLs.
//!
//! ## URI Structure
//!
//! Follows the Canonical URI Resolution Standard:
//! ```text
//! https://schemas.3leaps.dev/<module>/<topic>/<version>/<filename>
//! ```
//!
//! Where:
//! - `module` = `osprims` (source repository)
//! - `topic` = feature area (e.g., `errors`, `lock`, `direct-io`)
//! - `version` = SemVer (e.g., `v1.0.0`)
//! - `filename` = schema file with `.schema.json` suffix
//!
//! ## Validation Strategy
//!
//! osprims does NOT perform runtime JSON schema validation. Schema ID
//! verification is covered by unit tests.

/// Schema ID for `osprims classify --json` output (v1.0.0).
///
/// Schema location: `schemas/errors/v1.0.0/classify-result.schema.json`
pub const CLASSIFY_RESULT_V1: &str =
    "https://schemas.3leaps.dev/osprims/errors/v1.0.0/classify-result.schema.json";

/// Schema ID for `osprims lock --json` output (v1.0.0).
///
/// Schema location: `schemas/lock/v1.0.0/lock-result.schema.json`
pub const LOCK_RESULT_V1: &str =
    "https://schemas.3leaps.dev/osprims/lock/v1.0.0/lock-result.schema.json";

/// Schema ID for `osprims direct-io --json` output (v1.0.0).
///
/// Schema location: `schemas/direct-io/v1.0.0/direct-io-probe.schema.json`
pub const DIRECT_IO_PROBE_V1: &str =
    "https://schemas.3leaps.dev/osprims/direct-io/v1.0.0/direct-io-probe.schema.json";
