//! Station bus UART adapter.
//!
//! Implements [`SerialRx`] and [`SerialTx`] on top of the ESP-IDF UART
//! driver configured for the station protocol: 7 data bits, even parity,
//! one stop bit, RS-485 half duplex with the transceiver enable on RTS.
//!
//! The driver is installed once; the receive and transmit halves are
//! separate handles so the receiver task can block in `read_byte` while
//! the controller task writes.  The IDF driver serialises access to the
//! peripheral internally.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::app::ports::{SerialError, SerialRx, SerialTx};
#[cfg(target_os = "espidf")]
use crate::pins;

/// Errors while bringing up the station bus UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartInitError {
    ParamConfig(i32),
    SetPin(i32),
    DriverInstall(i32),
    SetMode(i32),
}

impl core::fmt::Display for UartInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ParamConfig(rc) => write!(f, "uart_param_config failed (rc={})", rc),
            Self::SetPin(rc) => write!(f, "uart_set_pin failed (rc={})", rc),
            Self::DriverInstall(rc) => write!(f, "uart_driver_install failed (rc={})", rc),
            Self::SetMode(rc) => write!(f, "uart_set_mode failed (rc={})", rc),
        }
    }
}

impl core::error::Error for UartInitError {}

/// Receive half of the station bus.
#[cfg(target_os = "espidf")]
pub struct UartRx {
    port: uart_port_t,
}

/// Transmit half of the station bus.
#[cfg(target_os = "espidf")]
pub struct UartTx {
    port: uart_port_t,
}

/// Configure and install the station bus UART at `baud`.
#[cfg(target_os = "espidf")]
pub fn init_station_bus(baud: u32) -> Result<(UartRx, UartTx), UartInitError> {
    let port = pins::STATION_BUS_UART as uart_port_t;
    let cfg = uart_config_t {
        baud_rate: baud as i32,
        data_bits: uart_word_length_t_UART_DATA_7_BITS,
        parity: uart_parity_t_UART_PARITY_EVEN,
        stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
        flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
        ..Default::default()
    };

    // SAFETY: called once from main() before either task is spawned.
    unsafe {
        let ret = uart_param_config(port, &cfg);
        if ret != ESP_OK {
            return Err(UartInitError::ParamConfig(ret));
        }
        let ret = uart_set_pin(
            port,
            pins::STATION_BUS_TX_GPIO,
            pins::STATION_BUS_RX_GPIO,
            pins::STATION_BUS_DE_GPIO,
            -1,
        );
        if ret != ESP_OK {
            return Err(UartInitError::SetPin(ret));
        }
        let ret = uart_driver_install(
            port,
            pins::STATION_BUS_RX_BUF,
            pins::STATION_BUS_TX_BUF,
            0,
            core::ptr::null_mut(),
            0,
        );
        if ret != ESP_OK {
            return Err(UartInitError::DriverInstall(ret));
        }
        let ret = uart_set_mode(port, uart_mode_t_UART_MODE_RS485_HALF_DUPLEX);
        if ret != ESP_OK {
            return Err(UartInitError::SetMode(ret));
        }
    }

    info!("uart: station bus on UART{} at {} baud 7E1", port, baud);
    Ok((UartRx { port }, UartTx { port }))
}

#[cfg(target_os = "espidf")]
impl SerialRx for UartRx {
    fn read_byte(&mut self) -> Result<u8, SerialError> {
        let mut byte = 0u8;
        // SAFETY: `byte` outlives the call; length 1 matches the buffer.
        let n = unsafe {
            uart_read_bytes(
                self.port,
                (&raw mut byte).cast(),
                1,
                TickType_t::MAX,
            )
        };
        match n {
            1 => Ok(byte),
            // Timed out without data; treat like a transient fault.
            0 => Err(SerialError::Io),
            _ => Err(SerialError::Closed),
        }
    }
}

#[cfg(target_os = "espidf")]
impl SerialTx for UartTx {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        // SAFETY: the IDF driver copies `bytes` into its TX ring buffer.
        let n = unsafe { uart_write_bytes(self.port, bytes.as_ptr().cast(), bytes.len()) };
        if n < 0 {
            return Err(SerialError::Io);
        }
        Ok(())
    }
}
