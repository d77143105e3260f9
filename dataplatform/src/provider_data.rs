//! Provider data structure passed to resources

use crate::api::PlatformClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct DataPlatformProviderData {
    pub client: Arc<dyn PlatformClient>,
    /// Plan-time suppression of diffs that match the last observed value
    pub suppress_snapshot_diffs: bool,
}

impl DataPlatformProviderData {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self {
            client,
            suppress_snapshot_diffs: false,
        }
    }

    pub fn with_snapshot_suppression(mut self, enabled: bool) -> Self {
        self.suppress_snapshot_diffs = enabled;
        self
    }
}
