use axum::{
    http::HeaderMap,
    middleware::{from_fn_with_state, map_response},
    routing::{get, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::Auth;
use crate::config::AppConfig;
use crate::database::models::USER_RESOURCE;
use crate::database::{Repository, Store};
use crate::handlers::{auth, public, user};
use crate::jsonapi::links::{request_origin, LinkBuilder};
use crate::middleware::{allow_header, bearer_auth};
use crate::pagination::PageLimits;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub users: Repository,
    pub auth: Arc<Auth>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let users = Repository::new(&USER_RESOURCE, store.clone());
        let auth = Arc::new(Auth::new(users.clone(), &config.security));
        Self { config: Arc::new(config), store, users, auth }
    }

    pub fn links(&self, headers: &HeaderMap) -> LinkBuilder {
        LinkBuilder::new(&self.config.api, request_origin(headers).as_deref())
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits::from(&self.config.api)
    }

    /// `/{prefix}/{version}`, or `/{version}` behind a configured domain
    pub fn mount_path(&self) -> String {
        let api = &self.config.api;
        if api.domain.is_some() || api.prefix.is_empty() {
            format!("/{}", api.version)
        } else {
            format!("/{}/{}", api.prefix, api.version)
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mount = state.mount_path();
    let at = |path: &str| format!("{}{}", mount, path);
    let guarded = || from_fn_with_state(state.clone(), bearer_auth);

    Router::new()
        // Public
        .route("/", with_405(get(public::ok)))
        .route("/health", with_405(get(public::health)))
        .route(&mount, with_405(get(public::ok)))
        .route(&at("/"), with_405(get(public::ok)))
        // User resource
        .route(&at("/user"), with_405(get(user::user_list).post(user::user_create)))
        .route(
            &at("/user/:uuid"),
            with_405(
                get(user::user_show)
                    .put(user::user_update)
                    .patch(user::user_update)
                    .delete(user::user_delete),
            ),
        )
        // Auth
        .route(
            &at("/auth/token"),
            with_405(
                get(auth::token_register)
                    .post(auth::token_create)
                    .merge(put(auth::token_refresh).delete(auth::token_delete).route_layer(guarded())),
            ),
        )
        .route(
            &at("/auth"),
            with_405(
                post(auth::register).merge(
                    get(auth::profile)
                        .put(auth::profile_update)
                        .patch(auth::profile_update)
                        .route_layer(guarded()),
                ),
            ),
        )
        .fallback(public::not_found)
        // Global middleware
        .layer(map_response(allow_header))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn with_405(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.fallback(public::method_not_allowed)
}
