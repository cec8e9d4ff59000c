use std::sync::Arc;

use {ghostbridge_intent::Intent, ghostbridge_protocol::UserId};

/// Hands out the identity proxy for a user.
pub trait IntentDirectory: Send + Sync {
    /// Proxy for `user_id`, or for the bridge bot when `None`.
    fn intent(&self, user_id: Option<&UserId>) -> Arc<Intent>;
}
