//! HTTP surface for the student tracker
//!
//! Each route maps onto exactly one data operation.

pub mod handlers;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(crate::health_check))
        .route("/students", web::get().to(handlers::list_students))
        .route("/students", web::post().to(handlers::create_student))
        .route("/students/{id}", web::get().to(handlers::view_student))
        .route("/students/{id}", web::delete().to(handlers::delete_student))
        .route("/students/{id}/grades", web::get().to(handlers::list_grades))
        .route("/students/{id}/grades", web::post().to(handlers::add_grade))
        .route("/subjects/{subject}/topper", web::get().to(handlers::subject_topper))
        .route("/subjects/{subject}/average", web::get().to(handlers::class_average))
        .route("/backup", web::get().to(handlers::download_backup));
}
