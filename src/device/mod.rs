//! Opening, configuring and discovering serial devices

mod config;
pub use config::{DataBits, Parity, SerialConfig, StopBits, DEFAULT_BAUD_RATE};

mod hooks;
pub use hooks::Hooks;

mod port;
pub use port::{Port, Stats};

mod ports_info;
pub use ports_info::{find_usb_port, list_ports, PortInfo, UsbIdentity};
