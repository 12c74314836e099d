use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::{DeviceBridge, DeviceConnector, DeviceResult, DEFAULT_SERIAL};

/// Connection pool keyed by device serial.
///
/// Bridges are opened on first use and kept until [`DevicePool::shutdown`].
/// The pool is owned by the server state and passed down by reference.
pub struct DevicePool {
    connector: Arc<dyn DeviceConnector>,
    devices: RwLock<HashMap<String, Arc<dyn DeviceBridge>>>,
}

impl DevicePool {
    pub fn new(connector: Arc<dyn DeviceConnector>) -> Self {
        Self { connector, devices: RwLock::new(HashMap::new()) }
    }

    /// Bridge for `serial`, connecting on first request.
    pub fn get(&self, serial: &str) -> DeviceResult<Arc<dyn DeviceBridge>> {
        if let Some(d) = self.devices.read().get(serial) {
            return Ok(d.clone());
        }
        // connect without the lock so a slow device does not stall the others
        let target = if serial == DEFAULT_SERIAL { None } else { Some(serial) };
        let bridge = self.connector.connect(target)?;

        let mut map = self.devices.write();
        // a concurrent request may have connected first; keep that one
        if let Some(d) = map.get(serial) {
            return Ok(d.clone());
        }
        info!(target: "device", serial, "device connected");
        map.insert(serial.to_string(), bridge.clone());
        Ok(bridge)
    }

    pub fn connected(&self) -> usize {
        self.devices.read().len()
    }

    /// Drop every pooled connection.
    pub fn shutdown(&self) {
        let mut map = self.devices.write();
        let n = map.len();
        map.clear();
        debug!(target: "device", released = n, "device pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceError, UiNode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};

    struct FakeDevice;

    impl DeviceBridge for FakeDevice {
        fn capture_screenshot(&self) -> DeviceResult<Vec<u8>> {
            Ok(vec![0xff, 0xd8, 0xff])
        }
        fn dump_ui_tree(&self) -> DeviceResult<Vec<UiNode>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        calls: AtomicUsize,
        serials: Mutex<Vec<Option<String>>>,
    }

    impl DeviceConnector for CountingConnector {
        fn connect(&self, serial: Option<&str>) -> DeviceResult<Arc<dyn DeviceBridge>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.serials.lock().unwrap().push(serial.map(|s| s.to_string()));
            if serial == Some("offline") {
                return Err(DeviceError::Unavailable("offline".into()));
            }
            Ok(Arc::new(FakeDevice))
        }
    }

    #[test]
    fn connects_lazily_once_per_serial() {
        let conn = Arc::new(CountingConnector::default());
        let pool = DevicePool::new(conn.clone());
        assert_eq!(pool.connected(), 0);

        pool.get("emulator-5554").unwrap();
        pool.get("emulator-5554").unwrap();
        pool.get(DEFAULT_SERIAL).unwrap();

        assert_eq!(conn.calls.load(Ordering::SeqCst), 2);
        assert_eq!(pool.connected(), 2);
        let serials = conn.serials.lock().unwrap().clone();
        assert_eq!(serials, vec![Some("emulator-5554".to_string()), None]);
    }

    #[test]
    fn failed_connections_are_not_pooled() {
        let conn = Arc::new(CountingConnector::default());
        let pool = DevicePool::new(conn.clone());
        assert!(pool.get("offline").is_err());
        assert!(pool.get("offline").is_err());
        assert_eq!(conn.calls.load(Ordering::SeqCst), 2);
        assert_eq!(pool.connected(), 0);
    }

    /// Blocks connects to "slow" until released.
    struct GatedConnector {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl DeviceConnector for GatedConnector {
        fn connect(&self, serial: Option<&str>) -> DeviceResult<Arc<dyn DeviceBridge>> {
            if serial == Some("slow") {
                self.entered.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            Ok(Arc::new(FakeDevice))
        }
    }

    #[test]
    fn slow_connect_does_not_block_pooled_devices() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let pool = DevicePool::new(Arc::new(GatedConnector {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        }));
        pool.get("fast").unwrap();

        std::thread::scope(|s| {
            let slow = s.spawn(|| pool.get("slow").map(|_| ()));
            entered_rx.recv().unwrap();
            // "slow" is mid-connect; pooled and fresh serials are still served
            pool.get("fast").unwrap();
            pool.get("other").unwrap();
            release_tx.send(()).unwrap();
            slow.join().unwrap().unwrap();
        });
        assert_eq!(pool.connected(), 3);
    }

    #[test]
    fn shutdown_releases_connections() {
        let conn = Arc::new(CountingConnector::default());
        let pool = DevicePool::new(conn.clone());
        pool.get("a").unwrap();
        pool.shutdown();
        assert_eq!(pool.connected(), 0);
        pool.get("a").unwrap();
        assert_eq!(conn.calls.load(Ordering::SeqCst), 2);
    }
}
