use insight_core::{Job, JobId};
use insight_logging::insight_debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::{ClientSettings, EnqueueResponse, FailureKind, FetchError, JobRequest};

/// Remote job service. Both the polling paths and manual refresh go through
/// [`JobService::get_job`].
#[async_trait::async_trait]
pub trait JobService: Send + Sync {
    async fn enqueue(&self, request: &JobRequest) -> Result<EnqueueResponse, FetchError>;

    async fn get_job(&self, job_id: &str) -> Result<Job, FetchError>;

    /// Most recent jobs of `owner_id`, newest first.
    async fn get_user_jobs(&self, owner_id: &str, limit: usize) -> Result<Vec<Job>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct UserJobs {
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReqwestJobService {
    client: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

impl ReqwestJobService {
    pub fn new(settings: &ClientSettings) -> Result<Self, FetchError> {
        let base = Url::parse(&settings.api_base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(FetchError::new(
                FailureKind::InvalidUrl,
                format!("{base} cannot be used as a base url"),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            base,
            api_key: settings.api_key.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(ACCEPT, "application/json");
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, FetchError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                error_detail(&body).unwrap_or_else(|| status.to_string()),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
    }
}

#[async_trait::async_trait]
impl JobService for ReqwestJobService {
    async fn enqueue(&self, request: &JobRequest) -> Result<EnqueueResponse, FetchError> {
        let body = serde_json::to_string(request)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        let url = self.endpoint(&["jobs", "enqueue"]);
        insight_debug!("Enqueueing {:?} job at {url}", request.job_type);
        self.send_json(
            self.client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(body),
        )
        .await
    }

    async fn get_job(&self, job_id: &str) -> Result<Job, FetchError> {
        let job: Job = self
            .send_json(self.client.get(self.endpoint(&["jobs", job_id])))
            .await?;
        Ok(job)
    }

    async fn get_user_jobs(&self, owner_id: &str, limit: usize) -> Result<Vec<Job>, FetchError> {
        let mut url = self.endpoint(&["jobs", "user", owner_id]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        let listing: UserJobs = self.send_json(self.client.get(url)).await?;
        Ok(listing.jobs)
    }
}

fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.detail.or(parsed.message).filter(|text| !text.is_empty())
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return FetchError::new(FailureKind::Decode, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

/// Ids are opaque; this only guards against obviously unusable values.
pub(crate) fn is_plausible_job_id(job_id: &JobId) -> bool {
    !job_id.trim().is_empty()
}
