use crate::{Community, CommunityType, CommunityUpdate, Membership, NewCommunity, SocialApi};
use api_transport::{ApiResult, FileUpload, MultipartPayload};
use serde_json::{json, Value};

impl SocialApi {
    pub async fn create_community(&self, community: &NewCommunity) -> ApiResult<Value> {
        self.client
            .post(&self.communities_url("/community/"), community)
            .await
    }

    pub async fn communities(&self) -> ApiResult<Vec<Community>> {
        self.client.get(&self.communities_url("/community/")).await
    }

    pub async fn created_communities(&self, user_id: i64) -> ApiResult<Vec<Community>> {
        self.client
            .get_with_params(
                &self.communities_url("/community/by-created/"),
                &json!({ "created_by": user_id }),
            )
            .await
    }

    pub async fn joined_communities(&self, user_id: i64) -> ApiResult<Vec<Community>> {
        self.client
            .get(&self.communities_url(&format!("/community/joined-community/{}", user_id)))
            .await
    }

    pub async fn search_communities(&self, query: &str) -> ApiResult<Vec<Community>> {
        self.client
            .get_with_params(
                &self.communities_url("/community/search/"),
                &json!({ "q": query }),
            )
            .await
    }

    /// Community details. The shape varies with the caller's membership,
    /// so the raw document is returned.
    pub async fn community(&self, id: i64) -> ApiResult<Value> {
        self.client
            .get(&self.communities_url(&format!("/community/{}", id)))
            .await
    }

    pub async fn upload_community_avatar(
        &self,
        community_id: i64,
        avatar: FileUpload,
    ) -> ApiResult<Value> {
        let form = MultipartPayload::new().file("avatar", avatar);
        self.client
            .post_form_data(
                &self.communities_url(&format!("/community/{}/upload-avatar/", community_id)),
                form,
            )
            .await
    }

    pub async fn update_community(
        &self,
        community_id: i64,
        update: &CommunityUpdate,
    ) -> ApiResult<Value> {
        self.client
            .put(
                &self.communities_url(&format!("/community/{}/", community_id)),
                update,
            )
            .await
    }

    pub async fn delete_community(&self, community_id: i64) -> ApiResult<Value> {
        self.client
            .delete(
                &self.communities_url(&format!("/community/{}/", community_id)),
                None,
            )
            .await
    }

    pub async fn join_community(&self, membership: &Membership) -> ApiResult<Value> {
        self.client
            .post(&self.communities_url("/community-member/"), membership)
            .await
    }

    pub async fn members(&self, community_id: i64) -> ApiResult<Value> {
        self.client
            .get(&self.communities_url(&format!("/community-member/{}", community_id)))
            .await
    }

    pub async fn pending_members(&self, community_id: i64) -> ApiResult<Value> {
        self.client
            .get(&self.communities_url(&format!(
                "/community-member/pending/{}",
                community_id
            )))
            .await
    }

    pub async fn approve_member(&self, community_id: i64, user_id: i64) -> ApiResult<Value> {
        self.client
            .patch(
                &self.communities_url(&format!(
                    "/community-member/{}/approve-member/{}",
                    community_id, user_id
                )),
                &json!({}),
            )
            .await
    }

    pub async fn reject_member(&self, community_id: i64, user_id: i64) -> ApiResult<Value> {
        self.client
            .delete(
                &self.communities_url(&format!(
                    "/community-member/{}/reject-member/{}",
                    community_id, user_id
                )),
                None,
            )
            .await
    }

    pub async fn community_types(&self) -> ApiResult<Vec<CommunityType>> {
        self.client
            .get(&self.communities_url("/community-type/"))
            .await
    }
}
