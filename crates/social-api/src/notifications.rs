use crate::{Notification, SocialApi};
use api_transport::ApiResult;
use serde_json::{json, Value};

impl SocialApi {
    pub async fn notifications(&self) -> ApiResult<Vec<Notification>> {
        self.client.get(&self.notifications_url("/")).await
    }

    pub async fn mark_notification_read(&self, notification_id: i64) -> ApiResult<Value> {
        self.client
            .patch(
                &self.notifications_url(&format!("/{}/read/", notification_id)),
                &json!({}),
            )
            .await
    }

    pub async fn mark_all_notifications_read(&self) -> ApiResult<Value> {
        self.client
            .patch(&self.notifications_url("/read-all/"), &json!({}))
            .await
    }
}
