use log::debug;
use serialport::SerialPortType;

use crate::{Error, Result};

/// An attached serial port and, for USB adapters, its identity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortInfo {
    pub path: String,
    pub usb: Option<UsbIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsbIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl PortInfo {
    /// `vvvv:pppp` in lowercase hex, as udev writes it
    pub fn usb_id(&self) -> Option<String> {
        self.usb
            .as_ref()
            .map(|u| format!("{:04x}:{:04x}", u.vendor_id, u.product_id))
    }
}

/// Enumerate the serial ports currently attached
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    debug!("list_ports: found {} port(s)", ports.len());
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            path: p.port_name,
            usb: match p.port_type {
                SerialPortType::UsbPort(usb) => Some(UsbIdentity {
                    vendor_id: usb.vid,
                    product_id: usb.pid,
                    serial_number: usb.serial_number,
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                }),
                _ => None,
            },
        })
        .collect())
}

/// Find the first attached port with the given USB vendor and product id
pub fn find_usb_port(vendor_id: u16, product_id: u16) -> Result<PortInfo> {
    list_ports()?
        .into_iter()
        .find(|p| {
            p.usb
                .as_ref()
                .is_some_and(|u| u.vendor_id == vendor_id && u.product_id == product_id)
        })
        .ok_or_else(|| Error::NotFound(format!("usb device {:04x}:{:04x}", vendor_id, product_id)))
}
