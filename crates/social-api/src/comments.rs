use crate::{Comment, NewComment, SocialApi};
use api_transport::ApiResult;
use serde_json::{json, Value};

impl SocialApi {
    /// Top-level comments of a post.
    pub async fn fetch_comments(&self, post_id: i64) -> ApiResult<Vec<Comment>> {
        self.client
            .get_with_params(
                &self.posts_url("/comments/fetch"),
                &json!({ "post_id": post_id }),
            )
            .await
    }

    pub async fn fetch_comment_replies(&self, comment_id: i64) -> ApiResult<Vec<Comment>> {
        self.client
            .get_with_params(
                &self.posts_url("/comments/fetch-replies"),
                &json!({ "comment_id": comment_id }),
            )
            .await
    }

    pub async fn insert_comment(&self, comment: &NewComment) -> ApiResult<Value> {
        self.client
            .post(&self.posts_url("/comments/create"), comment)
            .await
    }

    pub async fn delete_comment(&self, comment_id: i64) -> ApiResult<Value> {
        self.client
            .delete(
                &self.posts_url("/comments/delete"),
                Some(json!({ "comment_id": comment_id })),
            )
            .await
    }
}
