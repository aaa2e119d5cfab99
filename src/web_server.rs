use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::Config;
use crate::engine::Engine;
use crate::routes::{json_error_handler, post_execute_handler};

pub fn build_server(config: Config) -> std::io::Result<Server> {
    let Config {
        server: server_config,
        engine,
    } = config;
    let engine = web::Data::new(Engine::new(engine));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(engine.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::Logger::default())
            .service(post_execute_handler)
    })
    .bind((
        server_config
            .bind_address
            .unwrap_or("127.0.0.1".to_string()),
        server_config.bind_port.unwrap_or(12345),
    ))?
    .run();

    Ok(server)
}
