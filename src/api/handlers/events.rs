use crate::{api::handlers::lookup_realm, auth::store::RealmStore, events::RegistrationTrigger};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegistrationEvent {
    principal_id: Uuid,
}

#[utoipa::path(
    post,
    path= "/v1/{realm}/events/registration",
    params(
        ("realm" = String, Path, description = "Realm name")
    ),
    request_body = RegistrationEvent,
    responses (
        (status = 202, description = "Event accepted"),
        (status = 404, description = "Unknown realm"),
    ),
    tag= "events"
)]
#[instrument(skip(trigger, realms))]
pub async fn registration(
    Path(realm_name): Path<String>,
    trigger: Extension<Arc<RegistrationTrigger>>,
    realms: Extension<Arc<dyn RealmStore>>,
    payload: Option<Json<RegistrationEvent>>,
) -> impl IntoResponse {
    let event: RegistrationEvent = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()),
    };

    let realm = match lookup_realm(&realms, &realm_name).await {
        Ok(realm) => realm,
        Err(response) => return response,
    };

    // The trigger swallows its own failures; an accepted event is accepted.
    trigger
        .on_principal_registered(event.principal_id, realm.id)
        .await;

    (StatusCode::ACCEPTED, "Event accepted".to_string())
}
