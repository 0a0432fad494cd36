use async_trait::async_trait;
use serde_json::Value;

/// Hook converting a payload written under an older schema version.
///
/// Called at most once per load, only when the file's version is lower than
/// the store's target version. The returned payload is adopted and written
/// back immediately under the target version.
///
/// Plain closures of shape `Fn(Value, u32) -> anyhow::Result<Value>` implement
/// this trait; implement it by hand when the conversion needs to await.
#[async_trait]
pub trait Migrate: Send + Sync {
    async fn migrate(&self, payload: Value, from_version: u32) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F> Migrate for F
where
    F: Fn(Value, u32) -> anyhow::Result<Value> + Send + Sync,
{
    async fn migrate(&self, payload: Value, from_version: u32) -> anyhow::Result<Value> {
        self(payload, from_version)
    }
}
