use serial_cancel::device::{list_ports, Port, SerialConfig};
use std::time::Duration;

fn main() -> Result<(), serial_cancel::Error> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        for port in list_ports()? {
            match port.usb_id() {
                Some(id) => println!("{} ({})", port.path, id),
                None => println!("{}", port.path),
            }
        }
        return Ok(());
    };

    let baud_rate = match args.next() {
        Some(b) => b
            .parse()
            .map_err(|e| serial_cancel::Error::Configuration(format!("baud rate {:?}: {}", b, e)))?,
        None => serial_cancel::device::DEFAULT_BAUD_RATE,
    };
    let port = Port::open(&path, &SerialConfig::new(baud_rate))?;

    let mut buf = [0u8; 256];
    loop {
        let n = port.read(&mut buf, Duration::from_millis(500), 1)?;
        if n > 0 {
            println!("{:?}", String::from_utf8_lossy(&buf[..n]));
        }
    }
}
