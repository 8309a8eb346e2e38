use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Reject statements that would modify the ephemeral store.
    #[serde(default)]
    pub read_only: bool,
}
