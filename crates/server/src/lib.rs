pub mod api;
pub mod bootstrap;
pub mod crm;
pub mod health;
pub mod inbound;
pub mod nda;
pub mod pdf;

use axum::Router;
use leadsign_db::DbPool;
use tower_http::services::ServeDir;

use crate::bootstrap::AppState;

/// Every HTTP route the service exposes.
pub fn router(state: AppState, db_pool: DbPool) -> Router {
    let signed = ServeDir::new(&state.config.storage.root);
    Router::new()
        .merge(health::router(db_pool))
        .merge(inbound::router(state.clone()))
        .merge(nda::router(state))
        .nest_service("/nda/signed", signed)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use leadsign_db::connect_with_settings;
    use serde_json::json;
    use tower::ServiceExt;

    use super::router;
    use crate::bootstrap::test_support::{config_in, state_for};
    use crate::pdf::fixtures::nda_template;

    #[tokio::test]
    async fn saved_documents_are_served_from_the_signed_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = config_in(dir.path());
        std::fs::write(&config.storage.template_path, nda_template()).expect("template");
        let state = state_for(&config).await;
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        let app = router(state, pool);

        let save = Request::builder()
            .method("POST")
            .uri("/nda/c-1/save")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"ref_id": "R7", "name": "Dana", "email": "d@example.com"}).to_string(),
            ))
            .expect("request");
        assert_eq!(app.clone().oneshot(save).await.expect("save").status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/nda/signed/nda_signed_R7.pdf")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert!(bytes.starts_with(b"%PDF"));

        let missing = app
            .oneshot(
                Request::builder()
                    .uri("/nda/signed/nda_signed_nobody.pdf")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
