use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_BATCH: usize = 200;
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Configures a [`Batcher`](crate::Batcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct BatcherConfig {
    /// A window is dispatched as soon as it holds this many keys.
    /// Zero is treated as one.
    #[builder(default = DEFAULT_MAX_BATCH)]
    pub max_batch: usize,
    /// A window is dispatched this long after its first key arrived,
    /// if it has not filled up by then.
    #[builder(default = DEFAULT_WAIT)]
    pub wait: Duration,
}

impl BatcherConfig {
    pub(crate) fn batch_limit(&self) -> usize {
        self.max_batch.max(1)
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
