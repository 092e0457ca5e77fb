use actix_files::Files;
use actix_web::web::Data;
use actix_web::{App, HttpServer, middleware::Logger};
use dotenvy::dotenv;

use floortrack::config::Config;
use floortrack::{AppState, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    env_logger::init();

    let config = Config::from_env();
    let uploads = config.uploads_dir();
    for dir in ["images", "videos"] {
        std::fs::create_dir_all(uploads.join(dir))?;
    }
    std::fs::create_dir_all(&config.data_dir)?;

    let bind = (config.bind_addr.clone(), config.port);
    log::info!(
        "serving data from {:?} on {}:{}",
        config.data_dir,
        bind.0,
        bind.1
    );
    let state = Data::new(AppState::new(config));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(handlers::config)
            .service(Files::new("/uploads", uploads.clone()))
    })
    .bind(bind)?
    .run()
    .await
}
