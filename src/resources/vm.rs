use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::{
    constants::{
        DEFAULT_BOOT_ORDER, DEFAULT_CORES, DEFAULT_CPU_MODEL, DEFAULT_NET_DEVICE, DEFAULT_RAM_MB,
        DEFAULT_VGA_MODEL,
    },
    error::{Error, Result},
};

/// Declares a closed set of string choices accepted by the control plane.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident($label:literal) {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim() {
                    $($value => Ok($name::$variant),)+
                    other => {
                        let choices = $name::ALL
                            .iter()
                            .map(|c| c.as_str())
                            .collect::<Vec<_>>()
                            .join(", ");
                        Err(Error::validation(format!(
                            "invalid {} '{}' (expected one of: {})",
                            $label, other, choices
                        )))
                    }
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                value.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

choice_enum! {
    CpuModel("cpu model") {
        Max => "max",
        Qemu64 => "qemu64",
        Host => "host",
        HaswellV4 => "Haswell-v4",
        SkylakeClientV4 => "Skylake-Client-v4",
    }
}

choice_enum! {
    NetDevice("network device") {
        VirtioNetPci => "virtio-net-pci",
        E1000 => "e1000",
        Rtl8139 => "rtl8139",
    }
}

choice_enum! {
    VgaModel("vga model") {
        Virtio => "virtio",
        Std => "std",
        Qxl => "qxl",
        Vmware => "vmware",
        Cirrus => "cirrus",
    }
}

choice_enum! {
    /// QEMU `-boot order=` value: c = disk, d = cdrom, n = network.
    BootOrder("boot order") {
        Disk => "c",
        Cdrom => "d",
        Network => "n",
        DiskCdrom => "cd",
        CdromDisk => "dc",
        NetworkCdromDisk => "ncd",
        CdromNetworkDisk => "dnc",
    }
}

impl Default for CpuModel {
    fn default() -> Self {
        DEFAULT_CPU_MODEL
    }
}

impl Default for NetDevice {
    fn default() -> Self {
        DEFAULT_NET_DEVICE
    }
}

impl Default for VgaModel {
    fn default() -> Self {
        DEFAULT_VGA_MODEL
    }
}

impl Default for BootOrder {
    fn default() -> Self {
        DEFAULT_BOOT_ORDER
    }
}

/// Editable fields of a [`VmConfig`], addressed by their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmField {
    RamMb,
    Cores,
    CpuModel,
    PrimaryDiskPath,
    CdromPath,
    DataDiskPath,
    NetDevice,
    VgaModel,
    BootOrder,
}

impl VmField {
    pub fn name(&self) -> &'static str {
        match self {
            VmField::RamMb => "ram_mb",
            VmField::Cores => "cores",
            VmField::CpuModel => "cpu_model",
            VmField::PrimaryDiskPath => "primary_disk_path",
            VmField::CdromPath => "cdrom_path",
            VmField::DataDiskPath => "data_disk_path",
            VmField::NetDevice => "net_device",
            VmField::VgaModel => "vga_model",
            VmField::BootOrder => "boot_order",
        }
    }
}

/// Configuration submitted wholesale with a start request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VmConfig {
    pub ram_mb: u32,
    pub cores: u32,
    pub cpu_model: CpuModel,
    pub primary_disk_path: String,
    #[serde(
        default,
        serialize_with = "serialize_optional_path",
        deserialize_with = "deserialize_optional_path"
    )]
    pub cdrom_path: Option<String>,
    #[serde(
        default,
        serialize_with = "serialize_optional_path",
        deserialize_with = "deserialize_optional_path"
    )]
    pub data_disk_path: Option<String>,
    pub net_device: NetDevice,
    pub vga_model: VgaModel,
    pub boot_order: BootOrder,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            ram_mb: DEFAULT_RAM_MB,
            cores: DEFAULT_CORES,
            cpu_model: DEFAULT_CPU_MODEL,
            primary_disk_path: String::new(),
            cdrom_path: None,
            data_disk_path: None,
            net_device: DEFAULT_NET_DEVICE,
            vga_model: DEFAULT_VGA_MODEL,
            boot_order: DEFAULT_BOOT_ORDER,
        }
    }
}

impl VmConfig {
    /// Applies a single user edit given as raw text.
    pub fn set(&mut self, field: VmField, raw: impl AsRef<str>) -> Result<()> {
        let raw = raw.as_ref();
        match field {
            VmField::RamMb => self.ram_mb = parse_positive(field, raw)?,
            VmField::Cores => self.cores = parse_positive(field, raw)?,
            VmField::CpuModel => self.cpu_model = raw.parse()?,
            VmField::PrimaryDiskPath => self.primary_disk_path = raw.trim().to_string(),
            VmField::CdromPath => self.cdrom_path = non_empty(raw),
            VmField::DataDiskPath => self.data_disk_path = non_empty(raw),
            VmField::NetDevice => self.net_device = raw.parse()?,
            VmField::VgaModel => self.vga_model = raw.parse()?,
            VmField::BootOrder => self.boot_order = raw.parse()?,
        }
        Ok(())
    }

    /// Checks the preconditions of a start request.
    pub fn validate(&self) -> Result<()> {
        if self.primary_disk_path.trim().is_empty() {
            return Err(Error::validation("Primary disk path is required"));
        }
        if self.ram_mb == 0 {
            return Err(Error::validation("ram_mb must be a positive integer"));
        }
        if self.cores == 0 {
            return Err(Error::validation("cores must be a positive integer"));
        }
        Ok(())
    }

    /// Copy with surrounding whitespace stripped from every path.
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        config.primary_disk_path = config.primary_disk_path.trim().to_string();
        config.cdrom_path = config.cdrom_path.as_deref().and_then(non_empty);
        config.data_disk_path = config.data_disk_path.as_deref().and_then(non_empty);
        config
    }
}

fn parse_positive(field: VmField, raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Error::validation(format!(
            "{} must be a positive integer, got '{}'",
            field.name(),
            raw.trim()
        ))),
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// An unset path goes over the wire as `""` so the server clears it
/// instead of substituting its own default.
fn serialize_optional_path<S: Serializer>(
    path: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(path.as_deref().unwrap_or(""))
}

fn deserialize_optional_path<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(non_empty))
}

/// Decodes a choice, falling back to the built-in default for values this
/// client does not know.
fn lenient_choice<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr<Err = Error> + Default,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_else(|e| {
        warn!("ignoring server default: {}", e);
        T::default()
    }))
}

/// Payload of `GET /get_defaults`.
///
/// The server prefixes every key with `default_`; bare names are accepted too.
/// Missing keys and unknown choices fall back to the built-in defaults.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VmDefaults {
    #[serde(rename = "default_ram_mb", alias = "ram_mb")]
    pub ram_mb: u32,
    #[serde(rename = "default_cores", alias = "cores")]
    pub cores: u32,
    #[serde(
        rename = "default_cpu_model",
        alias = "cpu_model",
        deserialize_with = "lenient_choice"
    )]
    pub cpu_model: CpuModel,
    #[serde(rename = "default_primary_disk_path", alias = "primary_disk_path")]
    pub primary_disk_path: String,
    #[serde(rename = "default_cdrom_path", alias = "cdrom_path")]
    pub cdrom_path: String,
    #[serde(rename = "default_data_disk_path", alias = "data_disk_path")]
    pub data_disk_path: String,
    #[serde(
        rename = "default_net_device",
        alias = "net_device",
        deserialize_with = "lenient_choice"
    )]
    pub net_device: NetDevice,
    #[serde(
        rename = "default_vga_model",
        alias = "vga_model",
        deserialize_with = "lenient_choice"
    )]
    pub vga_model: VgaModel,
    #[serde(
        rename = "default_boot_order",
        alias = "boot_order",
        deserialize_with = "lenient_choice"
    )]
    pub boot_order: BootOrder,
}

impl Default for VmDefaults {
    fn default() -> Self {
        let config = VmConfig::default();
        Self {
            ram_mb: config.ram_mb,
            cores: config.cores,
            cpu_model: config.cpu_model,
            primary_disk_path: config.primary_disk_path,
            cdrom_path: String::new(),
            data_disk_path: String::new(),
            net_device: config.net_device,
            vga_model: config.vga_model,
            boot_order: config.boot_order,
        }
    }
}

impl From<VmDefaults> for VmConfig {
    fn from(defaults: VmDefaults) -> Self {
        Self {
            ram_mb: defaults.ram_mb,
            cores: defaults.cores,
            cpu_model: defaults.cpu_model,
            primary_disk_path: defaults.primary_disk_path.trim().to_string(),
            cdrom_path: non_empty(&defaults.cdrom_path),
            data_disk_path: non_empty(&defaults.data_disk_path),
            net_device: defaults.net_device,
            vga_model: defaults.vga_model,
            boot_order: defaults.boot_order,
        }
    }
}

/// Payload of `GET /vm_status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VmStatus {
    pub running: bool,
}

/// `{status, message}` reply of the start, stop and run endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Payload of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: String,
    pub vm_running: bool,
}

/// What the client believes about the VM lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunState {
    #[default]
    Unknown,
    Running,
    Stopped,
    /// The control plane could not be reached or answered garbage.
    Unreachable,
}

impl RunState {
    pub fn from_status(status: VmStatus) -> Self {
        if status.running {
            RunState::Running
        } else {
            RunState::Stopped
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Unknown => "Checking...",
            RunState::Running => "Running",
            RunState::Stopped => "Stopped",
            RunState::Unreachable => "Unreachable (server down?)",
        };
        f.write_str(label)
    }
}
