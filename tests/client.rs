mod common;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};

use collabmate::client::session::{SessionStore, ROLE, TOKEN};
use collabmate::client::views::{filter_projects, guard_route, ProjectTab, RouteDecision, LAST_ADMIN_GUARD_MESSAGE};
use collabmate::client::{ApiClient, ClientError, LOGIN_ROUTE};
use collabmate::middleware::Authentication;
use collabmate::models::task::{CreateTaskRequest, TaskFilter};
use collabmate::models::ListQuery;
use collabmate::validation::{LoginForm, RegisterForm};

fn register_form(name: &str, email: &str) -> RegisterForm {
    RegisterForm {
        name: name.into(),
        email: email.into(),
        password: common::PASSWORD.into(),
    }
}

#[actix_web::test]
async fn client_drives_the_api_end_to_end() {
    let ctx = common::ctx();
    let state = ctx.state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Authentication::new(common::JWT_SECRET))
            .app_data(web::Data::new(state.clone()))
            .configure(collabmate::configure_api)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind");
    let base = format!("http://{}", server.addrs()[0]);
    let running = server.run();
    let handle = running.handle();
    actix_web::rt::spawn(running);

    // registration persists the session
    let ada = ApiClient::new(&base, Arc::new(SessionStore::new()));
    let auth = ada.register(&register_form("Ada", "ada@example.com")).await.expect("register");
    assert_eq!(ada.session().get(TOKEN).as_deref(), Some(auth.token.as_str()));
    assert_eq!(ada.session().get(ROLE).as_deref(), Some("user"));
    assert_eq!(guard_route("/dashboard/projects", ada.session()), RouteDecision::Allow);
    assert_eq!(
        guard_route("/admin", ada.session()),
        RouteDecision::Redirect("/dashboard/projects")
    );

    // form rules apply before any request goes out
    let err = ada
        .login(&LoginForm {
            email: "not-an-email".into(),
            password: common::PASSWORD.into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Invalid(_)));

    // server errors surface their message
    let other = ApiClient::new(&base, Arc::new(SessionStore::new()));
    let err = other
        .register(&register_form("Ada Again", "ada@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(err.to_string(), "Email already registered");

    // projects and tasks
    ada.create_project("Engine", "Analytical", Some("hardware")).await.expect("project");
    let projects = ada.projects().await.expect("projects");
    assert_eq!(filter_projects(&projects, ProjectTab::Owned, "engine").len(), 1);
    assert!(filter_projects(&projects, ProjectTab::Shared, "").is_empty());

    let task = ada
        .create_task(&CreateTaskRequest {
            title: "Gears".into(),
            description: None,
            due_date: None,
            project: Some(projects[0].project.id.clone()),
            assigned_to: None,
            completed: None,
        })
        .await
        .expect("task");
    let tasks = ada
        .tasks(&TaskFilter {
            project: Some(projects[0].project.id.clone()),
            assigned_to: None,
        })
        .await
        .expect("tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, task.id);
    assert!(ada.email_exists("ada@example.com").await.expect("lookup"));
    ApiClient::new(&base, Arc::new(SessionStore::new()))
        .register(&register_form("Query", "who?where#lab@example.com"))
        .await
        .expect("register odd email");
    assert!(ada.email_exists("who?where#lab@example.com").await.expect("lookup"));

    // admin view with the page-level last-admin guard
    let root = ApiClient::new(&base, Arc::new(SessionStore::new()));
    let root_auth = root
        .register(&register_form("Root", common::ADMIN_EMAIL))
        .await
        .expect("admin register");
    assert_eq!(root_auth.redirect_to, "/admin");
    let page = root
        .admin_users(&ListQuery {
            sort: Some("email".into()),
            ..Default::default()
        })
        .await
        .expect("users");
    assert_eq!(page.total, 3);
    let err = root
        .deactivate_user(&page.items, &root_auth.user.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), LAST_ADMIN_GUARD_MESSAGE);

    let ada_id = auth.user.id.clone();
    let deactivated = root.deactivate_user(&page.items, &ada_id).await.expect("deactivate");
    assert!(!deactivated.active);
    let err = ada.profile().await.unwrap_err();
    assert_eq!(err.status(), Some(403));

    // a rejected token ends the session and points back to login
    let stale = ApiClient::new(&base, Arc::new(SessionStore::new()));
    stale.session().set(TOKEN, "expired-token");
    let err = stale.profile().await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert!(!stale.session().is_authenticated());
    assert_eq!(stale.session().take_redirect().as_deref(), Some(LOGIN_ROUTE));

    // a failed login keeps the server's wording
    let err = stale
        .login(&LoginForm {
            email: "nobody@example.com".into(),
            password: common::PASSWORD.into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), collabmate::auth::INVALID_CREDENTIALS);
    assert!(!stale.session().is_authenticated());

    handle.stop(true).await;
}
