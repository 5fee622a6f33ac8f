use axum::{extract::State, routing::post, Json, Router};

use crate::error::ApiResult;
use crate::mail::Message;
use crate::models::{SendMailRequest, SendMailResponse};
use crate::state::AppState;

/// Mail routes
pub fn mail_routes() -> Router<AppState> {
    Router::new().route("/", post(send_mail))
}

/// POST /api/v1/mail - Send one message through the configured mailer
async fn send_mail(
    State(state): State<AppState>,
    Json(request): Json<SendMailRequest>,
) -> ApiResult<Json<SendMailResponse>> {
    let message = Message::new(request.fields)?;
    let recipients = message.send_to().len();

    state.mailer.send(&message).await?;

    tracing::info!(
        recipients,
        subject = message.subject(),
        "Mail sent via API"
    );

    Ok(Json(SendMailResponse {
        sent: true,
        recipients,
        suppressed: state.mailer.suppress(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use crate::api::create_router;
    use crate::mail::{DispatchBus, MailConfig, Mailer};
    use crate::models::SendMailResponse;
    use crate::state::AppState;

    fn test_state(bus: &Arc<DispatchBus>) -> AppState {
        AppState::new(
            Mailer::new(MailConfig {
                server: Some("smtp.example.com".to_string()),
                default_sender: Some("noreply@example.com".to_string()),
                suppress: Some(true),
                ..Default::default()
            })
            .with_bus(Arc::clone(bus)),
        )
    }

    fn post_mail(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/mail")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_mail_is_recorded() {
        let bus = Arc::new(DispatchBus::new());
        let state = test_state(&bus);
        let recorder = state.mailer.record_messages().unwrap();

        let response = create_router(state)
            .oneshot(post_mail(
                r#"{"subject":"testing","recipients":["a@example.com"],"cc":["b@example.com"],"body":"hi"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: SendMailResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            parsed,
            SendMailResponse {
                sent: true,
                recipients: 2,
                suppressed: true,
            }
        );

        let outbox = recorder.messages();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].subject(), "testing");
    }

    #[tokio::test]
    async fn test_invalid_message_is_bad_request() {
        let bus = Arc::new(DispatchBus::new());
        let recorder = test_state(&bus).mailer.record_messages().unwrap();

        let response = create_router(test_state(&bus))
            .oneshot(post_mail(r#"{"subject":"testing","recipients":["nope"]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(recorder.is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_mail_mode() {
        let bus = Arc::new(DispatchBus::new());
        let response = create_router(test_state(&bus))
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["mail_mode"], "suppressed");
        assert_eq!(health["mail_server"], "smtp.example.com");
    }
}
