//! Server identity.

use super::StatsCollector;
use crate::deadline::Deadline;
use crate::error::{Category, CollectError};
use crate::model::ServerInfo;
use crate::source::SourceReader;

impl<S: SourceReader> StatsCollector<S> {
    pub(crate) async fn fetch_info(&self, deadline: Deadline) -> Result<ServerInfo, CollectError> {
        let info = self
            .get_json::<ServerInfo>("/info", false, Category::Info, deadline)
            .await?
            .unwrap_or_default();
        Ok(info)
    }
}
