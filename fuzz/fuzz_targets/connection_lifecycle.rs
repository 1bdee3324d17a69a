#![no_main]

use ferrous_conn::{
    Connection, ConnectionManager, ConnectionStatus, Driver, DriverError, ManagerConfig, ManagerKind,
    RequestContext,
};
use libfuzzer_sys::fuzz_target;

struct FlakyDriver;

impl Driver for FlakyDriver {
    type Config = u8;
    type Instance = u8;

    fn create(&self, config: &u8) -> Result<u8, DriverError> {
        // Some resources refuse connections
        if *config == 0 {
            return Err("refused".into());
        }
        Ok(*config)
    }

    fn check(&self, instance: &u8) -> Result<bool, DriverError> {
        Ok(instance % 3 != 0)
    }

    fn reconnect(&self, _: &u8, _: &u8) -> Result<(), DriverError> {
        Ok(())
    }

    fn close(&self, instance: &u8) -> Result<(), DriverError> {
        if instance % 5 == 0 {
            return Err("close failed".into());
        }
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let kind = match data[0] % 3 {
        0 => ManagerKind::AlwaysNew,
        1 => ManagerKind::ContextSingleton,
        _ => ManagerKind::BoundedPool,
    };
    let resources: Vec<u8> = data[1..4].to_vec();
    let config = ManagerConfig::new(kind, resources)
        .with_statistics(true)
        .with_check_state(data[0] & 0x80 != 0)
        .with_max_connections(usize::from(data[1] % 4) + 1);
    let manager = match ConnectionManager::new(FlakyDriver, config) {
        Ok(manager) => manager,
        Err(_) => return,
    };

    let mut contexts: Vec<RequestContext> = (0..4).map(|i| RequestContext::new(format!("ctx-{}", i))).collect();
    let mut held: Vec<Connection<FlakyDriver>> = Vec::new();

    for &byte in &data[4..] {
        let arg = usize::from(byte >> 3);
        match byte & 0x07 {
            0 => {
                if let Ok(conn) = manager.get_connection(&contexts[arg % contexts.len()]) {
                    held.push(conn);
                }
            }
            1 => {
                if let Ok(conn) = manager.create_connection() {
                    held.push(conn);
                }
            }
            2 if !held.is_empty() => {
                let _ = held[arg % held.len()].release();
            }
            3 if !held.is_empty() => {
                let _ = held[arg % held.len()].detach();
            }
            4 if !held.is_empty() => {
                let index = arg % held.len();
                held.swap_remove(index);
            }
            5 => {
                let index = arg % contexts.len();
                contexts[index].end();
                contexts[index] = RequestContext::new("replacement");
            }
            6 => {
                let _ = manager.close();
            }
            _ => {
                if let Ok(stats) = manager.statistics() {
                    if kind == ManagerKind::BoundedPool {
                        assert_eq!(
                            stats.total_connection_count,
                            stats.free_connection_count + stats.used_connection_count
                        );
                    }
                }
            }
        }
    }

    for conn in &held {
        if conn.status() != ConnectionStatus::Available {
            assert!(conn.instance().is_err());
        }
    }
});
