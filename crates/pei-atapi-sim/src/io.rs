use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use pei_atapi::PortIo;

pub trait PortIoDevice {
    fn read(&mut self, port: u16, size: u8) -> u32;
    fn write(&mut self, port: u16, size: u8, value: u32);
}

/// Number of port accesses that reached the bus, shareable with the test that owns the bus.
#[derive(Debug, Clone, Default)]
pub struct AccessCounter(Rc<Cell<u64>>);

impl AccessCounter {
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }
}

/// Port-indexed dispatch to device models. Unmapped ports float high.
#[derive(Default)]
pub struct IoPortBus {
    devices: HashMap<u16, Box<dyn PortIoDevice>>,
    accesses: AccessCounter,
}

impl IoPortBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, port: u16, device: Box<dyn PortIoDevice>) {
        self.devices.insert(port, device);
    }

    /// Register one wrapper device per port of a contiguous range.
    pub fn register_shared_range<F>(&mut self, start: u16, len: u16, mut make: F)
    where
        F: FnMut(u16) -> Box<dyn PortIoDevice>,
    {
        for offset in 0..len {
            let port = start.wrapping_add(offset);
            self.register(port, make(port));
        }
    }

    pub fn access_counter(&self) -> AccessCounter {
        self.accesses.clone()
    }

    pub fn read(&mut self, port: u16, size: u8) -> u32 {
        self.accesses.bump();
        match self.devices.get_mut(&port) {
            Some(dev) => dev.read(port, size),
            None => match size {
                1 => 0xFF,
                2 => 0xFFFF,
                _ => 0xFFFF_FFFF,
            },
        }
    }

    pub fn write(&mut self, port: u16, size: u8, value: u32) {
        self.accesses.bump();
        if let Some(dev) = self.devices.get_mut(&port) {
            dev.write(port, size, value);
        }
    }
}

impl PortIo for IoPortBus {
    fn read_u8(&mut self, port: u16) -> u8 {
        self.read(port, 1) as u8
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        self.write(port, 1, u32::from(value));
    }

    fn read_u16(&mut self, port: u16) -> u16 {
        self.read(port, 2) as u16
    }

    fn write_u16(&mut self, port: u16, value: u16) {
        self.write(port, 2, u32::from(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Latch {
        value: Rc<RefCell<u32>>,
    }

    impl PortIoDevice for Latch {
        fn read(&mut self, _port: u16, _size: u8) -> u32 {
            *self.value.borrow()
        }

        fn write(&mut self, _port: u16, _size: u8, value: u32) {
            *self.value.borrow_mut() = value;
        }
    }

    #[test]
    fn unmapped_ports_float_high_and_are_counted() {
        let mut bus = IoPortBus::new();
        let counter = bus.access_counter();
        assert_eq!(bus.read_u8(0x80), 0xFF);
        assert_eq!(bus.read_u16(0x80), 0xFFFF);
        bus.write_u8(0x80, 1);
        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn shared_range_dispatches_to_one_backing_value() {
        let value = Rc::new(RefCell::new(0));
        let mut bus = IoPortBus::new();
        bus.register_shared_range(0x100, 2, |_| {
            Box::new(Latch {
                value: value.clone(),
            })
        });

        bus.write_u8(0x100, 0x42);
        assert_eq!(bus.read_u8(0x101), 0x42);
        assert_eq!(bus.read_u8(0x102), 0xFF);
    }
}
