use actix_web::http::Method;
use actix_web::test::TestRequest;
use serde_json::Value;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::hash_password;
use crate::config::Config;
use crate::model::project::{Project, ProjectDraft, ProjectStatus};
use crate::model::role::Role;
use crate::model::user::{User, UserDraft};
use crate::state::AppState;
use crate::store::memory::MemoryStore;
use crate::store::{ProjectStore, UserStore};

pub const PASSWORD: &str = "site-password";

/// One user per role and two active projects on a fresh in-memory store.
pub struct Fixture {
    pub state: AppState,
    pub config: Config,
    pub admin: User,
    pub manager: User,
    pub supervisor: User,
    pub worker: User,
    pub site_a: Project,
    pub site_b: Project,
}

pub async fn fixture() -> Fixture {
    let store = MemoryStore::new();
    // one hash for everyone keeps argon2 out of the hot path
    let password = hash_password(PASSWORD).unwrap();

    let mut users = Vec::new();
    for (username, role) in [
        ("admin", Role::Admin),
        ("manager", Role::ProjectManager),
        ("supervisor", Role::Supervisor),
        ("ravi", Role::Worker),
    ] {
        let user = store
            .insert_user(UserDraft {
                username: username.to_string(),
                password: password.clone(),
                full_name: username.to_string(),
                mobile_number: None,
                role,
            })
            .await
            .unwrap();
        users.push(user);
    }
    let [admin, manager, supervisor, worker]: [User; 4] = users.try_into().unwrap();

    let mut projects = Vec::new();
    for name in ["Tower A", "Bridge B"] {
        let project = store
            .insert_project(ProjectDraft {
                name: name.to_string(),
                location: None,
                status: ProjectStatus::Active,
                created_by: manager.id,
            })
            .await
            .unwrap();
        projects.push(project);
    }
    let [site_a, site_b]: [Project; 2] = projects.try_into().unwrap();

    let config = Config::for_tests();
    let state = AppState::new(std::sync::Arc::new(store), config.project_cache_ttl_secs);

    Fixture {
        state,
        config,
        admin,
        manager,
        supervisor,
        worker,
        site_a,
        site_b,
    }
}

impl Fixture {
    pub fn token(&self, user: &User) -> String {
        generate_access_token(
            user.id,
            &user.username,
            user.role.id(),
            &self.config.jwt_secret,
            self.config.access_token_ttl,
        )
        .unwrap()
    }

    /// A request from `user`, or an anonymous one.
    pub fn request(&self, method: Method, uri: &str, user: Option<&User>) -> TestRequest {
        let req = TestRequest::default()
            .method(method)
            .uri(uri)
            .peer_addr("127.0.0.1:40000".parse().unwrap());
        match user {
            Some(user) => req.insert_header(("Authorization", format!("Bearer {}", self.token(user)))),
            None => req,
        }
    }
}

/// Builds the full route tree over a fixture's state.
macro_rules! test_app {
    ($fx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($fx.state.clone()))
                .app_data(actix_web::web::Data::new($fx.config.clone()))
                .configure(|cfg| crate::routes::configure(cfg, $fx.config.clone())),
        )
        .await
    };
}
pub(crate) use test_app;

/// Sends a request and returns the status with the decoded body.
macro_rules! send {
    ($app:expr, $req:expr) => {{
        let resp = actix_web::test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body = actix_web::test::read_body(resp).await;
        let json: serde_json::Value = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }};
}
pub(crate) use send;

pub fn id_of(body: &Value) -> u64 {
    body["data"]["id"].as_u64().unwrap()
}
