//! HTTP client utilities.

use reqwest::header::{COOKIE, REFERER};
use reqwest::{Client, RequestBuilder, Response};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::models::Cookies;
use crate::scrapers::ScrapeError;

/// Desktop browser user agent; publisher sites reject obvious bots
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    download_dir: PathBuf,
}

impl HttpClient {
    /// Create a new HTTP client saving downloads into `download_dir`
    pub fn new(download_dir: impl Into<PathBuf>) -> Result<Self, ScrapeError> {
        Self::with_user_agent(BROWSER_USER_AGENT, download_dir)
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(
        user_agent: &str,
        download_dir: impl Into<PathBuf>,
    ) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            download_dir: download_dir.into(),
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
        }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Directory downloads are written to
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// GET a page as text
    pub async fn get_text(&self, url: &str, cookies: Option<&Cookies>) -> Result<String, ScrapeError> {
        let request = with_cookies(self.client.get(url), cookies);
        let response = checked(request.send().await?)?;
        Ok(response.text().await?)
    }

    /// POST a urlencoded form and return the body as text
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        referer: Option<&str>,
    ) -> Result<String, ScrapeError> {
        let mut request = self.client.post(url).form(form);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }
        let response = checked(request.send().await?)?;
        Ok(response.text().await?)
    }

    /// GET raw bytes
    pub async fn get_bytes(
        &self,
        url: &str,
        cookies: Option<&Cookies>,
    ) -> Result<Vec<u8>, ScrapeError> {
        let request = with_cookies(self.client.get(url), cookies);
        let response = checked(request.send().await?)?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Download a PDF into the download directory and return its local path
    ///
    /// Every download gets its own file, `<url stem>-<random>.pdf`, so two
    /// URLs ending in the same segment never share a path.
    pub async fn download_pdf(
        &self,
        url: &str,
        cookies: Option<&Cookies>,
    ) -> Result<PathBuf, ScrapeError> {
        let bytes = self.get_bytes(url, cookies).await?;

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let (_file, path) = tempfile::Builder::new()
            .prefix(&format!("{}-", pdf_file_stem(url)))
            .suffix(".pdf")
            .tempfile_in(&self.download_dir)?
            .keep()
            .map_err(|e| e.error)?;
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!(url, path = %path.display(), size = bytes.len(), "Downloaded PDF");
        Ok(path)
    }
}

fn with_cookies(request: RequestBuilder, cookies: Option<&Cookies>) -> RequestBuilder {
    match cookies {
        Some(cookies) if !cookies.is_empty() => request.header(COOKIE, cookies.header_value()),
        _ => request,
    }
}

fn checked(response: Response) -> Result<Response, ScrapeError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ScrapeError::Network(format!(
            "HTTP {} from {}",
            status,
            response.url()
        )))
    }
}

/// Readable file stem for a downloaded PDF, from the last URL path segment
fn pdf_file_stem(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };
    let stem: String = path
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();

    match stem.len().checked_sub(4) {
        Some(cut) if stem[cut..].eq_ignore_ascii_case(".pdf") && cut > 0 => stem[..cut].to_string(),
        _ => stem,
    }
}
