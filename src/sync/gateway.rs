use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::RemoteError;
use crate::{
    auth::session::AuthProvider,
    model::DailyAggregate,
    tracking::dto::{
        CheckInRequest, CheckInResponse, LogNutritionRequest, LogNutritionResponse,
        LogWaterRequest, LogWaterResponse,
    },
};

/// Authoritative server operations the sync core depends on.
///
/// Log appends are not retry-safe: a retried append would be counted twice.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn log_water(&self, amount_ml: u32) -> Result<LogWaterResponse, RemoteError>;

    async fn log_nutrition(
        &self,
        item_id: &str,
        quantity: f64,
    ) -> Result<LogNutritionResponse, RemoteError>;

    async fn upsert_check_in(
        &self,
        request: &CheckInRequest,
    ) -> Result<CheckInResponse, RemoteError>;

    /// Server's current aggregate for `date`, `None` if the day has no row yet.
    async fn fetch_day(&self, date: &str) -> Result<Option<DailyAggregate>, RemoteError>;
}

/// Gateway speaking JSON over HTTP to the tracking API.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    auth: Arc<dyn AuthProvider>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, auth: Arc<dyn AuthProvider>) -> Self {
        Self::with_client(Client::new(), base_url, auth)
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, RemoteError> {
        let Some(token) = self.auth.bearer_token() else {
            return Err(RemoteError::Unauthorized);
        };
        Ok(request.header(AUTHORIZATION, format!("Bearer {token}")))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn log_water(&self, amount_ml: u32) -> Result<LogWaterResponse, RemoteError> {
        debug!(amount_ml, "POST /water");
        let request = self
            .client
            .post(self.url("/water"))
            .json(&LogWaterRequest { amount_ml });
        self.send_json(request).await
    }

    async fn log_nutrition(
        &self,
        item_id: &str,
        quantity: f64,
    ) -> Result<LogNutritionResponse, RemoteError> {
        debug!(item_id, quantity, "POST /nutrition");
        let request = self.client.post(self.url("/nutrition")).json(&LogNutritionRequest {
            item_id: item_id.to_string(),
            quantity,
        });
        self.send_json(request).await
    }

    async fn upsert_check_in(
        &self,
        request: &CheckInRequest,
    ) -> Result<CheckInResponse, RemoteError> {
        debug!("PUT /check-in");
        let request = self.client.put(self.url("/check-in")).json(request);
        self.send_json(request).await
    }

    async fn fetch_day(&self, date: &str) -> Result<Option<DailyAggregate>, RemoteError> {
        let request = self.client.get(self.url(&format!("/days/{date}")));
        match self.send_json(request).await {
            Ok(aggregate) => Ok(Some(aggregate)),
            Err(RemoteError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
        Json, Router,
    };
    use uuid::Uuid;

    use super::*;
    use crate::auth::session::StaticAuth;

    fn bearer(headers: &HeaderMap) -> bool {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Bearer "))
    }

    async fn serve_stub() -> String {
        let app = Router::new()
            .route(
                "/api/v1/water",
                post(|headers: HeaderMap, Json(body): Json<LogWaterRequest>| async move {
                    if !bearer(&headers) {
                        return Err(AxumStatus::UNAUTHORIZED);
                    }
                    Ok(Json(LogWaterResponse {
                        success: true,
                        updated_water_total: 1000 + body.amount_ml,
                    }))
                }),
            )
            .route(
                "/api/v1/nutrition",
                post(|| async { (AxumStatus::NOT_FOUND, "Item not found") }),
            )
            .route(
                "/api/v1/days/:date",
                get(|Path(date): Path<String>| async move {
                    if date == "2026-10-16" {
                        Ok(Json(DailyAggregate::empty(date)))
                    } else {
                        Err(AxumStatus::NOT_FOUND)
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/v1/")
    }

    #[tokio::test]
    async fn posts_water_with_bearer_token() {
        let base = serve_stub().await;
        let gateway = HttpGateway::new(base, Arc::new(StaticAuth::signed_in(Uuid::new_v4())));
        let reply = gateway.log_water(250).await.unwrap();
        assert_eq!(
            reply,
            LogWaterResponse {
                success: true,
                updated_water_total: 1250
            }
        );
    }

    #[tokio::test]
    async fn missing_token_never_reaches_the_server() {
        let base = serve_stub().await;
        let gateway = HttpGateway::new(base, Arc::new(StaticAuth::anonymous()));
        assert_eq!(gateway.log_water(250).await, Err(RemoteError::Unauthorized));
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let base = serve_stub().await;
        let gateway = HttpGateway::new(base, Arc::new(StaticAuth::signed_in(Uuid::new_v4())));
        let err = gateway.log_nutrition("unknown", 1.0).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Status {
                status: 404,
                message: "Item not found".into()
            }
        );
    }

    #[tokio::test]
    async fn fetch_day_maps_not_found_to_absent() {
        let base = serve_stub().await;
        let gateway = HttpGateway::new(base, Arc::new(StaticAuth::signed_in(Uuid::new_v4())));
        let day = gateway.fetch_day("2026-10-16").await.unwrap();
        assert_eq!(day.map(|d| d.date), Some("2026-10-16".to_string()));
        assert_eq!(gateway.fetch_day("2026-10-15").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let gateway = HttpGateway::new(
            "http://127.0.0.1:9",
            Arc::new(StaticAuth::signed_in(Uuid::new_v4())),
        );
        assert!(matches!(
            gateway.log_water(250).await,
            Err(RemoteError::Network(_))
        ));
    }
}
