use crate::models::VoteRequest;
use crate::{SocialApi, Vote, VoteType};
use api_transport::ApiResult;
use serde_json::{json, Value};

impl SocialApi {
    /// Cast or change a vote on a post, or on one of its comments.
    pub async fn upsert_vote(
        &self,
        post_id: i64,
        comment_id: Option<i64>,
        vote_type: VoteType,
    ) -> ApiResult<Value> {
        let vote = VoteRequest {
            post_id,
            comment_id,
            vote_type,
        };
        self.client
            .post(&self.posts_url("/votes/upsert"), &vote)
            .await
    }

    /// The signed-in user's vote, or `None` if they have not voted.
    pub async fn my_vote(&self, post_id: i64, comment_id: Option<i64>) -> ApiResult<Option<Vote>> {
        self.client
            .get_with_params(
                &self.posts_url("/votes/my-vote"),
                &json!({ "post_id": post_id, "comment_id": comment_id }),
            )
            .await
    }
}
