use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

const SWAGGER_PATH: &str = "/docs";
const OPENAPI_PATH: &str = "/api-doc/openapi.json";

/// Swagger UI at `/docs`, backed by the document at `/api-doc/openapi.json`.
pub fn router(state: SharedState) -> Router<SharedState> {
    let ui: Router<SharedState> = SwaggerUi::new(SWAGGER_PATH)
        .url(OPENAPI_PATH, ApiDoc::openapi())
        .into();

    ui.with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::{routes, services::test_support::test_state};

    use super::*;

    #[tokio::test]
    async fn serves_the_openapi_document() {
        let app = routes::router(test_state().await);
        let request = Request::get(OPENAPI_PATH).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/players/me/name"].is_object());
    }
}
