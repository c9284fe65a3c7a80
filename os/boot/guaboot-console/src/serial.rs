//! # 16550 UART

use crate::port::PortIo;
use core::fmt;

/// I/O base of the first serial port.
pub const COM1: u16 = 0x3F8;

const DATA: u16 = 0;
const INTERRUPT_ENABLE: u16 = 1;
const FIFO_CONTROL: u16 = 2;
const LINE_CONTROL: u16 = 3;
const MODEM_CONTROL: u16 = 4;
const LINE_STATUS: u16 = 5;

/// Line status: transmit holding register empty.
const LSR_THR_EMPTY: u8 = 0x20;

/// A polled 16550-compatible UART.
pub struct Uart16550<P: PortIo> {
    ports: P,
    base: u16,
}

impl<P: PortIo> Uart16550<P> {
    #[must_use]
    pub const fn new(ports: P, base: u16) -> Self {
        Self { ports, base }
    }

    #[must_use]
    pub const fn ports(&self) -> &P {
        &self.ports
    }

    /// Program 38400 baud, 8 data bits, no parity, one stop bit, FIFOs on.
    ///
    /// # Safety
    /// `base` must be the I/O base of a 16550-compatible UART.
    pub unsafe fn init(&self) {
        unsafe {
            self.ports.outb(self.base + INTERRUPT_ENABLE, 0x00);
            self.ports.outb(self.base + LINE_CONTROL, 0x80); // DLAB on
            self.ports.outb(self.base + DATA, 0x03); // divisor low: 115200 / 3
            self.ports.outb(self.base + INTERRUPT_ENABLE, 0x00); // divisor high
            self.ports.outb(self.base + LINE_CONTROL, 0x03); // 8N1, DLAB off
            self.ports.outb(self.base + FIFO_CONTROL, 0xC7); // enable, clear, 14-byte threshold
            self.ports.outb(self.base + MODEM_CONTROL, 0x0B); // DTR, RTS, OUT2
        }
    }

    /// Spin until the transmitter is ready, then send `byte`.
    pub fn write_byte(&self, byte: u8) {
        // SAFETY: only status reads and data writes on an initialized UART.
        unsafe {
            while self.ports.inb(self.base + LINE_STATUS) & LSR_THR_EMPTY == 0 {
                core::hint::spin_loop();
            }
            self.ports.outb(self.base + DATA, byte);
        }
    }
}

impl<P: PortIo> fmt::Write for &Uart16550<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(b);
        }
        Ok(())
    }
}
