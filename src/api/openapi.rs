use crate::api::handlers::{events, health, login};
use utoipa::OpenApi;

// Info (title, version, description, license) is taken from Cargo.toml
// package metadata by the derive.
#[derive(OpenApi)]
#[openapi(
    paths(health::health, login::login, events::registration),
    components(schemas(health::Health, login::Login, events::RegistrationEvent)),
    tags(
        (name = "auth", description = "Credential evaluation"),
        (name = "events", description = "Principal lifecycle events"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_covers_all_routes() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));

        let paths = &spec.paths.paths;
        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/v1/{realm}/login"));
        assert!(paths.contains_key("/v1/{realm}/events/registration"));
    }
}
