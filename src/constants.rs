use std::time::Duration;

use crate::resources::vm::{BootOrder, CpuModel, NetDevice, VgaModel};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_AUTO_REFRESH_ENABLED: bool = true;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u32 = 5;
pub const DEFAULT_KEEP_DISPLAY_AWAKE: bool = false;

pub const DEFAULT_STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_TERMINAL_POLL_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_START_REPOLL_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_STOP_REPOLL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_VIEWER_PATH: &str = "/noVNC/";

pub const DEFAULT_RAM_MB: u32 = 8192;
pub const DEFAULT_CORES: u32 = 6;
pub const DEFAULT_CPU_MODEL: CpuModel = CpuModel::Max;
pub const DEFAULT_NET_DEVICE: NetDevice = NetDevice::VirtioNetPci;
pub const DEFAULT_VGA_MODEL: VgaModel = VgaModel::Virtio;
pub const DEFAULT_BOOT_ORDER: BootOrder = BootOrder::Disk;

pub const QUICK_COMMANDS: &[&str] = &["ls -la", "ps aux", "df -h", "free -h", "uname -a"];
