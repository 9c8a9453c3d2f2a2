use serde::{Deserialize, Serialize};

/// Identity shape handed back by the federated auth provider. The core only
/// ever consumes `uid`; the rest is carried for the profile mirror.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}
