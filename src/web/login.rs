//! The login request pipeline: credential extraction, session
//! establishment, the early interstitial response and the background
//! service bootstrap that follows it.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use actix_web::http::header::{self, ContentType};
use actix_web::web::{Bytes, Data, Form};
use actix_web::{HttpRequest, HttpResponse};
use async_stream::stream;
use log::{debug, error, info};
use serde::Deserialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::auth::authenticate_user;
use crate::provider::UserSession;
use crate::services::{add_welcome_mail, ServicesRegistry};
use crate::web::pages;
use crate::web::session::HttpSessionStore;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// `GET /login` and `GET /`: the login form.
pub async fn login_form() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(pages::login_page(None))
}

/// `POST /login`.
///
/// On success the interstitial body is written and the connection released
/// before service bootstrap runs; failures render the form again with
/// status 401. A browser session that is already bound to a user is
/// redirected without consulting the provider.
pub async fn login_submit(
    state: Data<AppState>,
    req: HttpRequest,
    form: Form<LoginForm>,
) -> HttpResponse {
    let LoginForm { username, password } = form.into_inner();

    if let Some(existing) = state.sessions.resolve(&req) {
        if let Some(user_id) = state.sessions.bound_user(existing) {
            info!("{} already logged in as {}, redirecting", username, user_id);
            return HttpResponse::SeeOther()
                .insert_header((header::LOCATION, "/"))
                .finish();
        }
    }

    let session = match authenticate_user(
        state.provider.as_ref(),
        &username,
        &password,
        state.settings.provider.initial_sync,
        None,
    )
    .await
    {
        Ok(session) => session,
        Err(err) => {
            info!("login failed for {}: {}", username, err);
            return HttpResponse::Unauthorized()
                .content_type(ContentType::html())
                .body(pages::login_page(Some("Invalid credentials")));
        }
    };

    let (http_session, fresh_cookie) = match state.sessions.resolve(&req) {
        Some(id) => (id, None),
        None => {
            let id = state.sessions.create();
            (id, Some(HttpSessionStore::cookie_for(id)))
        }
    };

    // Respond-then-continue: bootstrap waits until the interstitial chunk
    // has been handed to the transport. A dropped sender means the client
    // went away before the body was written; bootstrap still runs so the
    // account is never left half-initialized.
    let (sent_tx, sent_rx) = oneshot::channel::<()>();
    let registry = Arc::clone(&state.registry);
    let sessions = Arc::clone(&state.sessions);
    tokio::spawn(async move {
        let _ = sent_rx.await;
        bootstrap_user_services(registry, sessions, http_session, username, session).await;
    });

    let body = stream! {
        yield Ok::<_, Infallible>(Bytes::from_static(pages::INTERSTITIAL.as_bytes()));
        let _ = sent_tx.send(());
    };

    let mut response = HttpResponse::Ok();
    response.content_type(ContentType::html());
    if let Some(cookie) = fresh_cookie {
        response.cookie(cookie);
    }
    response.streaming(body)
}

/// Background continuation of a successful login. The response is already
/// closed, so failures here go to the log, carrying the user id and the
/// stage that failed; `has_services` stays false and the next login
/// re-attempts the bootstrap.
async fn bootstrap_user_services(
    registry: Arc<ServicesRegistry>,
    sessions: Arc<HttpSessionStore>,
    http_session: Uuid,
    login: String,
    session: Arc<dyn UserSession>,
) {
    let user_id = session.user_id().to_string();
    let fresh = session.fresh_account();
    let started = Instant::now();

    let created = match registry.ensure(&user_id, Arc::clone(&session)).await {
        Ok(created) => created,
        Err(err) => {
            error!("bootstrap failed for {} at stage create-services: {}", user_id, err);
            return;
        }
    };
    registry.map_login(&login, &user_id);

    // seed only from the call that registered the fresh account, never twice
    if created && fresh {
        if let Err(err) = add_welcome_mail(session.mail_store().as_ref()).await {
            error!("bootstrap failed for {} at stage welcome-mail: {}", user_id, err);
            return;
        }
    }

    sessions.bind(http_session, &user_id);
    debug!(
        "bootstrap for {} finished in {}ms",
        user_id,
        started.elapsed().as_millis()
    );
}

/// `POST /logout`: drop the browser session and return to the login form.
/// The user's service bundle stays registered; eviction is an explicit
/// registry operation.
pub async fn logout(state: Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Some(id) = state.sessions.resolve(&req) {
        if let Some(user_id) = state.sessions.bound_user(id) {
            info!("logging out {}", user_id);
        }
        state.sessions.destroy(id);
    }
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/login"))
        .finish()
}

/// Fallback for every path outside the login surface: an unauthorized
/// marker for anonymous callers, 404 otherwise (the real application
/// mounts its resources over this).
pub async fn unauthorized_marker(state: Data<AppState>, req: HttpRequest) -> HttpResponse {
    let bound = state
        .sessions
        .resolve(&req)
        .and_then(|id| state.sessions.bound_user(id));
    match bound {
        Some(_) => HttpResponse::NotFound().finish(),
        None => HttpResponse::Unauthorized()
            .content_type(ContentType::html())
            .body(pages::unauthorized_page()),
    }
}
