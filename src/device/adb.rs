//! adb-backed device bridge.

use std::process::{Command, Output};
use std::sync::Arc;

use tracing::debug;

use super::uidump::parse_hierarchy;
use super::{DeviceBridge, DeviceConnector, DeviceError, DeviceResult, UiNode};

/// Opens [`AdbDevice`] bridges through the `adb` binary at `adb_path`.
#[derive(Debug, Clone)]
pub struct AdbConnector {
    adb_path: String,
}

impl AdbConnector {
    pub fn new(adb_path: impl Into<String>) -> Self {
        Self { adb_path: adb_path.into() }
    }
}

impl DeviceConnector for AdbConnector {
    fn connect(&self, serial: Option<&str>) -> DeviceResult<Arc<dyn DeviceBridge>> {
        let device = AdbDevice { adb_path: self.adb_path.clone(), serial: serial.map(|s| s.to_string()) };
        // `get-state` fails fast when the serial is unknown or no single device is attached
        let out = device.run(&["get-state"])?;
        let state = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if !out.status.success() || state != "device" {
            let why = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(DeviceError::Unavailable(format!(
                "{}: {}",
                serial.unwrap_or("default"),
                if why.is_empty() { state } else { why }
            )));
        }
        Ok(Arc::new(device))
    }
}

#[derive(Debug, Clone)]
pub struct AdbDevice {
    adb_path: String,
    serial: Option<String>,
}

impl AdbDevice {
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        cmd
    }

    fn run(&self, args: &[&str]) -> DeviceResult<Output> {
        debug!(target: "device", serial = ?self.serial, ?args, "adb");
        Ok(self.command(args).output()?)
    }

    fn run_ok(&self, args: &[&str]) -> DeviceResult<Vec<u8>> {
        let out = self.run(args)?;
        if !out.status.success() {
            return Err(DeviceError::CommandFailed(format!(
                "adb {} exited with {}: {}",
                args.join(" "),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(out.stdout)
    }
}

impl DeviceBridge for AdbDevice {
    fn capture_screenshot(&self) -> DeviceResult<Vec<u8>> {
        let png = self.run_ok(&["exec-out", "screencap", "-p"])?;
        if png.is_empty() {
            return Err(DeviceError::CommandFailed("screencap returned no data".into()));
        }
        Ok(png)
    }

    fn dump_ui_tree(&self) -> DeviceResult<Vec<UiNode>> {
        let raw = self.run_ok(&["exec-out", "uiautomator", "dump", "/dev/tty"])?;
        parse_hierarchy(&String::from_utf8_lossy(&raw))
    }
}
