#![no_main]

use ferrous_conn::{ConnError, ManagerConfig, ManagerKind};
use libfuzzer_sys::fuzz_target;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[allow(dead_code)]
    host: String,
}

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    match ManagerConfig::<Endpoint>::from_json(json) {
        Ok(config) => {
            // Anything accepted must be runnable
            assert!(!config.resources.is_empty());
            if config.kind == ManagerKind::BoundedPool {
                assert!(config.capacity() > 0);
            }
        }
        Err(err) => assert!(matches!(err, ConnError::Configuration(_))),
    }
});
