use crate::models::FactCheckRequest;
use crate::{FactCheckResult, SocialApi};
use api_transport::ApiResult;

impl SocialApi {
    /// Ask the fact-checking service to assess `claim`.
    pub async fn fact_check_claim(&self, claim: &str) -> ApiResult<Vec<FactCheckResult>> {
        self.client
            .post(&self.ai_url("/fact-check"), &FactCheckRequest { claim })
            .await
    }
}
