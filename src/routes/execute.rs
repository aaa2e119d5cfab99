use actix_web::{HttpResponse, Responder, post, web};

use crate::engine::{Engine, ExecutionRequest};

/// Runs one snippet; the body is `{source, language, stdin}`, all optional
#[post("/execute")]
pub async fn post_execute_handler(
    engine: web::Data<Engine>,
    body: web::Json<ExecutionRequest>,
) -> impl Responder {
    let request = body.into_inner();
    log::info!(
        "Executing {} bytes of {}",
        request.source.as_deref().map_or(0, str::len),
        request.language.as_deref().unwrap_or("javascript")
    );
    HttpResponse::Ok().json(engine.run(request).await)
}
