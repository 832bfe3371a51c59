use crate::{MediaUpload, NewPost, Post, PostPage, PostUpdate, SavedPost, SocialApi};
use api_transport::{ApiResult, MultipartPayload};
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

impl SocialApi {
    /// One page of the feed, newest first.
    pub async fn fetch_posts(&self, limit: u32, offset: u32) -> ApiResult<PostPage> {
        self.client
            .get_with_params(
                &self.posts_url("/posts"),
                &json!({ "limit": limit, "offset": offset }),
            )
            .await
    }

    pub async fn fetch_post(&self, id: i64) -> ApiResult<Post> {
        self.client.get(&self.posts_url(&format!("/posts/{}", id))).await
    }

    pub async fn delete_post(&self, id: i64) -> ApiResult<Value> {
        self.client
            .delete(&self.posts_url(&format!("/posts/{}", id)), None)
            .await
    }

    /// Create a post with its media as a multipart upload.
    pub async fn insert_post(&self, post: &NewPost, media: MediaUpload) -> ApiResult<Value> {
        debug!(
            subreddit_id = post.subreddit_id,
            media_type = %media.media_type,
            bytes = media.file.bytes.len(),
            "Uploading post"
        );
        let form = MultipartPayload::new()
            .text("title", &post.title)
            .text("content", &post.content)
            .text("subreddit_id", post.subreddit_id)
            .text("media_type", &media.media_type)
            .file("file", media.file);
        self.client
            .post_form_data(&self.posts_url("/posts"), form)
            .await
    }

    pub async fn update_post(&self, id: i64, update: &PostUpdate) -> ApiResult<Value> {
        self.client
            .put(&self.posts_url(&format!("/posts/{}", id)), update)
            .await
    }

    pub async fn save_post(&self, post_id: i64) -> ApiResult<Value> {
        self.client
            .post(&self.posts_url("/posts/save"), &json!({ "post_id": post_id }))
            .await
    }

    pub async fn delete_saved_post(&self, post_id: i64) -> ApiResult<Value> {
        self.client
            .delete(
                &self.posts_url("/posts/saved"),
                Some(json!({ "post_id": post_id })),
            )
            .await
    }

    /// Every post the signed-in user saved.
    pub async fn saved_posts(&self) -> ApiResult<Vec<SavedPost>> {
        self.client.get(&self.posts_url("/posts/saved")).await
    }

    /// The signed-in user's save of `post_id`, if any.
    pub async fn my_saved_post(&self, post_id: i64) -> ApiResult<Option<SavedPost>> {
        self.client
            .get_with_params(
                &self.posts_url("/posts/saved/mine"),
                &json!({ "post_id": post_id }),
            )
            .await
    }
}
