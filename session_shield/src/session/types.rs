use serde::{Deserialize, Serialize};

use crate::shield::ShieldBlock;
use crate::storage::CacheData;

use super::errors::SessionError;

/// The host session record as kept in the cache store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Logged-in member, 0 for anonymous
    pub member_id: i64,
    #[serde(
        rename = "XE_SESSION_SHIELD",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub shield: Option<ShieldBlock>,
}

impl TryFrom<&SessionRecord> for CacheData {
    type Error = SessionError;

    fn try_from(record: &SessionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            value: serde_json::to_string(record)
                .map_err(|e| SessionError::Corrupt(e.to_string()))?,
        })
    }
}

impl TryFrom<CacheData> for SessionRecord {
    type Error = SessionError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value).map_err(|e| SessionError::Corrupt(e.to_string()))
    }
}
