use crate::{ProfileUpdate, SocialApi};
use api_transport::ApiResult;
use serde_json::Value;

impl SocialApi {
    /// Partial update of the signed-in user's profile.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<Value> {
        self.client.put(&self.users_url("/profile"), update).await
    }
}
