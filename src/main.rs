use dotenv::dotenv;
use log::*;

use polls::{AppState, Config};

#[async_std::main]
async fn main() -> Result<(), std::io::Error> {
    dotenv().ok();
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Could not load configuration! {}", err);
            std::process::exit(1);
        }
    };
    let listen_addr = config.listen_addr.clone();

    match AppState::new(config).await {
        Ok(state) => {
            let app = polls::app(state);
            info!("Listening on http://{}", listen_addr);
            app.listen(listen_addr).await?;
            Ok(())
        }
        Err(err) => {
            error!("Could not initialize the application! {}", err);
            Err(std::io::Error::new(std::io::ErrorKind::Other, err))
        }
    }
}
