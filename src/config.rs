//! The configuration surface the filter pipeline and its stages consume.
//! No file/env parsing lives here — loading `ScimConfig` from whatever
//! format a host prefers is the host's job.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

/// Generates resource ids. Defaults to UUIDv4; injectable so hosts using
/// another id scheme (or tests wanting deterministic ids) can swap it in.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Supplies the current time. Defaults to the system clock; injectable
/// for deterministic `meta.created`/`meta.lastModified` assertions in
/// tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Bind points the `FilterPipeline` and its stages need from the host.
#[derive(Clone)]
pub struct ScimConfig {
    pub bcrypt_cost: u32,
    pub id_generator: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
    /// Used to build `meta.location` as `{base_url}/{endpoint}/{id}`.
    pub base_url: String,
}

impl ScimConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ScimConfig {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            id_generator: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock),
            base_url: base_url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    struct FixedClock(OffsetDateTime);
    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            self.0
        }
    }

    #[test]
    fn default_config_uses_uuidv4_ids() {
        let config = ScimConfig::new("https://example.com/scim/v2");
        let id = config.id_generator.generate();
        assert_eq!(Uuid::parse_str(&id).unwrap().get_version_num(), 4);
    }

    #[test]
    fn clock_is_swappable_for_deterministic_tests() {
        let fixed = OffsetDateTime::from_unix_timestamp(0).unwrap();
        let mut config = ScimConfig::new("https://example.com/scim/v2");
        config.clock = Arc::new(FixedClock(fixed));
        assert_eq!(config.clock.now(), fixed);
    }
}
