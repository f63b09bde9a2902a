use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::middleware::{JwtMiddleware, RequestLogger};
use crate::routes::{
    health_check, login, logout, logout_all, me, refresh, register, resend_verification,
    verify_email,
};
use crate::service::AuthService;

pub fn run(listener: TcpListener, service: AuthService) -> Result<Server, std::io::Error> {
    let codec = service.codec().clone();
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .app_data(service.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    .route("/verify-email", web::get().to(verify_email))
                    .route("/resend-verification", web::post().to(resend_verification)),
            )
            // Protected routes (require a bearer access token)
            .service(
                web::scope("/users")
                    .wrap(JwtMiddleware::new(codec.clone()))
                    .route("/me", web::get().to(me))
                    .route("/me/logout-all", web::post().to(logout_all)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
