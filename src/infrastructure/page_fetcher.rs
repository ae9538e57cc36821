use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_html(&self, url: &Url) -> Result<String, InfraError>;
}

/// Fetches pages with a shared cookie jar so same-site requests carry the
/// session the user already has.
#[derive(Debug, Clone)]
pub struct ReqwestPageFetcher {
    client: Client,
}

impl ReqwestPageFetcher {
    pub fn new() -> Result<Self, InfraError> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|error| InfraError::Http(format!("failed building page client: {error}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch_html(&self, url: &Url) -> Result<String, InfraError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|error| InfraError::Http(format!("network error while fetching {url}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Http(format!("failed reading page {url}: {error}")))?;
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "page fetch returned error status");
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_body_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<main>hello</main>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/article", server.uri())).expect("url");
        let body = ReqwestPageFetcher::new()
            .expect("fetcher")
            .fetch_html(&url)
            .await
            .expect("fetch");
        assert_eq!(body, "<main>hello</main>");
    }

    #[tokio::test]
    async fn replays_cookies_set_by_the_site() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session=abc; Path=/")
                    .set_body_string("ok"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .and(header("cookie", "session=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<main>secret</main>"))
            .mount(&server)
            .await;

        let fetcher = ReqwestPageFetcher::new().expect("fetcher");
        let base = server.uri();
        fetcher
            .fetch_html(&Url::parse(&format!("{base}/login")).expect("url"))
            .await
            .expect("login");
        let body = fetcher
            .fetch_html(&Url::parse(&format!("{base}/private")).expect("url"))
            .await
            .expect("private");
        assert_eq!(body, "<main>secret</main>");
    }

    #[tokio::test]
    async fn unreachable_host_is_an_http_error() {
        let server = MockServer::start().await;
        let url = Url::parse(&format!("{}/gone", server.uri())).expect("url");
        drop(server);
        let result = ReqwestPageFetcher::new().expect("fetcher").fetch_html(&url).await;
        assert!(matches!(result, Err(InfraError::Http(_))));
    }
}
