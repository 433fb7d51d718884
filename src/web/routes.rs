use actix_web::web;

use crate::web::login::{login_form, login_submit, logout, unauthorized_marker};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(login_form))
        .route("/login", web::get().to(login_form))
        .route("/login", web::post().to(login_submit))
        .route("/logout", web::post().to(logout))
        .default_service(web::route().to(unauthorized_marker));
}
