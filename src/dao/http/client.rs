use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::{
    dao::backend::{BackendResult, QuizBackend},
    dto::quiz::{CompetitionSlots, NewQuestionAttempt, PagedResponse, QuestionAttempt},
};

use super::{
    config::HttpBackendConfig,
    error::{HttpApiError, HttpResult},
};

/// Quiz backend speaking JSON over HTTP via reqwest.
#[derive(Clone)]
pub struct HttpQuizBackend {
    client: Client,
    base_url: Arc<str>,
    auth_token: Option<Arc<str>>,
}

impl HttpQuizBackend {
    /// Build a client from the given configuration.
    pub fn new(config: HttpBackendConfig) -> HttpResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| HttpApiError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let auth_token = config.auth_token.map(Arc::<str>::from);

        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        if let Some(ref token) = self.auth_token {
            builder.bearer_auth(token.as_ref())
        } else {
            builder
        }
    }

    async fn get_json<T>(&self, path: &str) -> HttpResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|source| HttpApiError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(HttpApiError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| HttpApiError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    /// Fetch one absolute page URL of a paged collection.
    async fn get_page<T>(&self, url: &str) -> HttpResult<PagedResponse<T>>
    where
        T: DeserializeOwned,
    {
        let mut builder = self.client.get(url);
        if let Some(ref token) = self.auth_token {
            builder = builder.bearer_auth(token.as_ref());
        }

        let response = builder
            .send()
            .await
            .map_err(|source| HttpApiError::RequestSend {
                path: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(HttpApiError::RequestStatus {
                path: url.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<PagedResponse<T>>()
            .await
            .map_err(|source| HttpApiError::DecodeResponse {
                path: url.to_string(),
                source,
            })
    }

    async fn collect_pages<T>(&self, first_path: &str) -> HttpResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let first: PagedResponse<T> = self.get_json(first_path).await?;
        let mut rows = first.results;
        let mut next = first.next;

        while let Some(url) = next {
            let page: PagedResponse<T> = self.get_page(&url).await?;
            rows.extend(page.results);
            next = page.next;
        }

        Ok(rows)
    }
}

impl QuizBackend for HttpQuizBackend {
    fn fetch_slots(&self, quiz_id: i64) -> BoxFuture<'static, BackendResult<CompetitionSlots>> {
        let backend = self.clone();
        Box::pin(async move {
            let path = format!("quiz/competition/{quiz_id}/slots/");
            let slots: CompetitionSlots = backend.get_json(&path).await?;
            Ok(slots)
        })
    }

    fn fetch_question_attempts(&self) -> BoxFuture<'static, BackendResult<Vec<QuestionAttempt>>> {
        let backend = self.clone();
        Box::pin(async move {
            let rows = backend.collect_pages("quiz/question-attempts/").await?;
            Ok(rows)
        })
    }

    fn save_answer(
        &self,
        attempt: NewQuestionAttempt,
    ) -> BoxFuture<'static, BackendResult<QuestionAttempt>> {
        let backend = self.clone();
        Box::pin(async move {
            const PATH: &str = "quiz/question-attempts/";

            let response = backend
                .request(Method::POST, PATH)
                .json(&attempt)
                .send()
                .await
                .map_err(|source| HttpApiError::RequestSend {
                    path: PATH.to_string(),
                    source,
                })?;

            if !response.status().is_success() {
                return Err(HttpApiError::RequestStatus {
                    path: PATH.to_string(),
                    status: response.status(),
                }
                .into());
            }

            let saved =
                response
                    .json::<QuestionAttempt>()
                    .await
                    .map_err(|source| HttpApiError::DecodeResponse {
                        path: PATH.to_string(),
                        source,
                    })?;

            Ok(saved)
        })
    }

    fn submit(&self, quiz_id: i64) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let path = format!("quiz/competition/{quiz_id}/submit/");

            let response = backend
                .request(Method::GET, &path)
                .send()
                .await
                .map_err(|source| HttpApiError::RequestSend {
                    path: path.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(HttpApiError::RequestStatus {
                    path,
                    status: response.status(),
                }
                .into())
            }
        })
    }
}
