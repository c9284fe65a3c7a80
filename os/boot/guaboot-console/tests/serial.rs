use core::cell::RefCell;
use core::fmt::Write;
use guaboot_console::port::PortIo;
use guaboot_console::serial::{COM1, Uart16550};

/// Records port writes; reports "busy" for a configurable number of status reads.
#[derive(Default)]
struct FakePorts {
    writes: RefCell<Vec<(u16, u8)>>,
    busy_polls: RefCell<u32>,
    status_reads: RefCell<u32>,
}

impl PortIo for FakePorts {
    unsafe fn outb(&self, port: u16, value: u8) {
        self.writes.borrow_mut().push((port, value));
    }

    unsafe fn inb(&self, port: u16) -> u8 {
        assert_eq!(port, COM1 + 5, "only the line status register is read");
        *self.status_reads.borrow_mut() += 1;
        let mut busy = self.busy_polls.borrow_mut();
        if *busy > 0 {
            *busy -= 1;
            0x00
        } else {
            0x20
        }
    }
}

#[test]
fn init_programs_38400_8n1_with_fifo() {
    let uart = Uart16550::new(FakePorts::default(), COM1);
    unsafe { uart.init() };

    let ports = uart_ports(&uart);
    assert_eq!(
        *ports.writes.borrow(),
        vec![
            (COM1 + 1, 0x00),
            (COM1 + 3, 0x80),
            (COM1, 0x03),
            (COM1 + 1, 0x00),
            (COM1 + 3, 0x03),
            (COM1 + 2, 0xC7),
            (COM1 + 4, 0x0B),
        ]
    );
}

#[test]
fn write_waits_for_transmitter() {
    let ports = FakePorts::default();
    *ports.busy_polls.borrow_mut() = 3;
    let uart = Uart16550::new(ports, COM1);

    uart.write_byte(b'A');

    let ports = uart_ports(&uart);
    assert_eq!(*ports.status_reads.borrow(), 4);
    assert_eq!(*ports.writes.borrow(), vec![(COM1, b'A')]);
}

#[test]
fn newline_becomes_crlf() {
    let uart = Uart16550::new(FakePorts::default(), COM1);
    write!(&uart, "ok\n").unwrap();

    let bytes: Vec<u8> = uart_ports(&uart)
        .writes
        .borrow()
        .iter()
        .map(|&(_, b)| b)
        .collect();
    assert_eq!(bytes, b"ok\r\n");
}

fn uart_ports(uart: &Uart16550<FakePorts>) -> &FakePorts {
    uart.ports()
}
