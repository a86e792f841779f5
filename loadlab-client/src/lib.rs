use loadlab_common::{
    AsyncResponse, CpuResponse, DocsResponse, Endpoint, ErrorCheckResponse, ErrorResponse,
    HealthResponse, JsonEchoResponse, LargeResponse, LoadLabError, MemoryResponse, Result,
    SlowResponse, StatsResponse,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// LoadLab client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
}

/// Sample payload sent to `POST /json` by `Client::hit`.
pub fn sample_json_payload() -> Value {
    serde_json::json!({
        "user_id": 4242,
        "action": "update",
        "data": {
            "timestamp": "2025-01-01T00:00:00Z",
            "value": 512.5,
            "metadata": { "source": "loadlab", "test": true }
        }
    })
}

/// LoadLab Client
pub struct Client {
    pub config: ClientConfig,
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http_client: reqwest::Client::new() }
    }

    /// Build the URL for an endpoint against the configured server.
    pub fn build_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint.path())
    }

    pub async fn docs(&self) -> Result<DocsResponse> {
        self.get_json(Endpoint::Docs).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json(Endpoint::Health).await
    }

    pub async fn cpu(&self) -> Result<CpuResponse> {
        self.get_json(Endpoint::Cpu).await
    }

    pub async fn slow(&self) -> Result<SlowResponse> {
        self.get_json(Endpoint::Slow).await
    }

    pub async fn memory(&self) -> Result<MemoryResponse> {
        self.get_json(Endpoint::Memory).await
    }

    /// Post `body` to `/json` and return the echo.
    pub async fn echo_json(&self, body: &Value) -> Result<JsonEchoResponse> {
        let response = self
            .http_client
            .post(self.build_url(Endpoint::Json))
            .json(body)
            .send()
            .await
            .map_err(|e| LoadLabError::NetworkError(e.to_string()))?;
        parse_json(response).await
    }

    /// Call `/error`; the simulated failure surfaces as `HttpError(500, ..)`.
    pub async fn error(&self) -> Result<ErrorCheckResponse> {
        self.get_json(Endpoint::Error).await
    }

    pub async fn stats(&self) -> Result<StatsResponse> {
        self.get_json(Endpoint::Stats).await
    }

    pub async fn large(&self) -> Result<LargeResponse> {
        self.get_json(Endpoint::Large).await
    }

    pub async fn async_ops(&self) -> Result<AsyncResponse> {
        self.get_json(Endpoint::Async).await
    }

    /// Read `/stream` chunk by chunk and return its lines.
    pub async fn stream(&self) -> Result<Vec<String>> {
        let mut response = self.send(Endpoint::Stream).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        let mut buffer = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| LoadLabError::NetworkError(e.to_string()))?
        {
            buffer.extend_from_slice(&chunk);
        }

        let text = String::from_utf8(buffer).map_err(|e| LoadLabError::InvalidBody(e.to_string()))?;
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Issue one request to `endpoint`, drain the body and return the status code.
    /// Only transport failures are errors; any HTTP status is a successful hit.
    pub async fn hit(&self, endpoint: Endpoint) -> Result<u16> {
        let response = match endpoint {
            Endpoint::Json => self
                .http_client
                .post(self.build_url(endpoint))
                .json(&sample_json_payload())
                .send()
                .await
                .map_err(|e| LoadLabError::NetworkError(e.to_string()))?,
            _ => self.send(endpoint).await?,
        };
        let status = response.status().as_u16();
        response
            .bytes()
            .await
            .map_err(|e| LoadLabError::NetworkError(e.to_string()))?;
        Ok(status)
    }

    async fn send(&self, endpoint: Endpoint) -> Result<reqwest::Response> {
        self.http_client
            .get(self.build_url(endpoint))
            .send()
            .await
            .map_err(|e| LoadLabError::NetworkError(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: Endpoint) -> Result<T> {
        let response = self.send(endpoint).await?;
        parse_json(response).await
    }
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(parse_error_response(status, response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| LoadLabError::InvalidBody(e.to_string()))
}

async fn parse_error_response(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> LoadLabError {
    let error_msg = response
        .json::<ErrorResponse>()
        .await
        .map(|r| r.message)
        .unwrap_or_else(|_| format!("Server returned status: {}", status));

    LoadLabError::HttpError(status.as_u16(), error_msg)
}
