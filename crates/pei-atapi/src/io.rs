/// Raw port I/O as provided by the platform.
///
/// Ports are absolute. 16-bit accesses are only used for the Data register.
pub trait PortIo {
    fn read_u8(&mut self, port: u16) -> u8;
    fn write_u8(&mut self, port: u16, value: u8);
    fn read_u16(&mut self, port: u16) -> u16;
    fn write_u16(&mut self, port: u16, value: u16);
}

impl<T: PortIo + ?Sized> PortIo for &mut T {
    fn read_u8(&mut self, port: u16) -> u8 {
        (**self).read_u8(port)
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        (**self).write_u8(port, value)
    }

    fn read_u16(&mut self, port: u16) -> u16 {
        (**self).read_u16(port)
    }

    fn write_u16(&mut self, port: u16, value: u16) {
        (**self).write_u16(port, value)
    }
}

impl<T: PortIo + ?Sized> PortIo for Box<T> {
    fn read_u8(&mut self, port: u16) -> u8 {
        (**self).read_u8(port)
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        (**self).write_u8(port, value)
    }

    fn read_u16(&mut self, port: u16) -> u16 {
        (**self).read_u16(port)
    }

    fn write_u16(&mut self, port: u16, value: u16) {
        (**self).write_u16(port, value)
    }
}
