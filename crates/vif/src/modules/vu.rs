use vumicro::{DATA_QWORDS, Execute, MICRO_PAIRS, MICRO_WORDS, Vu0};

/// Trait for vector unit modules.
pub trait VuModule {
    /// Runs the current micro program to its end. Returns the cycles it took.
    fn finish(&mut self) -> u64;
    /// Starts a micro program at instruction pair `addr`.
    fn start(&mut self, addr: u16);
    /// Continues the micro program at its current address.
    fn resume(&mut self);
    /// Writes a word of micro memory. `index` wraps.
    fn write_micro(&mut self, index: u32, word: u32);
    /// Reads a quadword of data memory. `qword` wraps.
    fn read_data(&self, qword: u32) -> [u32; 4];
    /// Writes a quadword of data memory. `qword` wraps.
    fn write_data(&mut self, qword: u32, value: [u32; 4]);
}

/// An implementation of [`VuModule`] which does nothing.
#[derive(Debug, Clone, Copy)]
pub struct NopVuModule;

impl VuModule for NopVuModule {
    fn finish(&mut self) -> u64 {
        0
    }

    fn start(&mut self, _: u16) {}
    fn resume(&mut self) {}

    fn write_micro(&mut self, _: u32, _: u32) {}

    fn read_data(&self, _: u32) -> [u32; 4] {
        [0; 4]
    }

    fn write_data(&mut self, _: u32, _: [u32; 4]) {}
}

impl<E: Execute> VuModule for Vu0<E> {
    fn finish(&mut self) -> u64 {
        Vu0::finish(self)
    }

    fn start(&mut self, addr: u16) {
        Vu0::start(self, addr % MICRO_PAIRS);
    }

    fn resume(&mut self) {
        Vu0::resume(self);
    }

    fn write_micro(&mut self, index: u32, word: u32) {
        self.micro[index as usize % MICRO_WORDS] = word;
    }

    fn read_data(&self, qword: u32) -> [u32; 4] {
        self.state.data[qword as usize % DATA_QWORDS]
    }

    fn write_data(&mut self, qword: u32, value: [u32; 4]) {
        self.state.data[qword as usize % DATA_QWORDS] = value;
    }
}
