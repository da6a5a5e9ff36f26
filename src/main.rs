use quickserve::{Acceptor, EventLoop, Router, ServerConfig};
use std::env;
use std::path::Path;
use std::process;

fn main() {
    env_logger::init();

    // First argument may name a JSON configuration file
    let args: Vec<String> = env::args().collect();
    let config = if args.len() > 1 && Path::new(&args[1]).exists() {
        match ServerConfig::from_json_file(&args[1]) {
            Ok(config) => config,
            Err(e) => {
                log::error!("could not load {}: {}", args[1], e);
                process::exit(1);
            }
        }
    } else {
        ServerConfig::new()
    };

    ctrlc::set_handler(|| {
        log::info!("shutdown signal received");
        process::exit(0);
    })
    .expect("error setting Ctrl-C handler");

    // Without a listening socket there is nothing to serve
    let acceptor = match Acceptor::bind(&config) {
        Ok(acceptor) => acceptor,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    match acceptor.local_addr() {
        Ok(addr) => log::info!("listening on {}", addr),
        Err(e) => log::warn!("could not read local address: {}", e),
    }

    let router = Router::new(&config);
    let mut event_loop = match EventLoop::new(acceptor, router, &config) {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = event_loop.run() {
        log::error!("{}", e);
        process::exit(1);
    }
}
