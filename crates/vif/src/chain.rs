//! Source chain walking and channel events.
use crate::{
    Vif0,
    dmac::{DmaChannel, Mode, Tag},
    modules::{Bus, IntcLine},
};
use bitos::integer::u4;
use tracing::{debug, warn};

impl Vif0 {
    /// Transfers the block at `madr`. Returns whether the block is finished.
    pub fn chain_payload(&mut self, bus: &mut Bus) -> bool {
        if self.channel.qwc == 0 && !self.session.stalled {
            return true;
        }

        let end = self.channel.qwc as usize * 4;
        let start = if self.session.stalled {
            (self.session.irq_offset as usize).min(end)
        } else {
            0
        };

        let Some(data) = bus
            .dmac
            .resolve(self.channel.madr)
            .and_then(|mem| mem.get(start..end))
        else {
            warn!(
                madr = self.channel.madr,
                qwc = self.channel.qwc,
                "vif0 payload address is unmapped"
            );

            self.session.cmd = 0;
            self.session.remaining = 0;
            self.channel.qwc = 0;
            return true;
        };

        self.transfer(&mut *bus.vu, data, false)
    }

    /// Reads the tag at `tadr`, transfers it if requested and then the block it points to.
    /// Returns whether the chain is finished.
    pub fn follow_chain_link(&mut self, bus: &mut Bus) -> bool {
        let tadr = self.channel.tadr;
        let words: Option<[u32; 4]> = bus
            .dmac
            .resolve(tadr)
            .and_then(|mem| mem.get(..4))
            .and_then(|words| words.try_into().ok());

        let Some(words) = words else {
            warn!(tadr, "vif0 tag address is unmapped");
            bus.dmac.bus_error(DmaChannel::Vif0);
            self.channel.control.set_started(false);
            self.session.done = true;
            return true;
        };

        let tag = Tag::from_words(words[0], words[1]);
        self.channel.qwc = tag.qwc() as u32;
        self.channel.control.set_tag(tag.control_bits());
        self.channel.madr = tag.addr();
        self.cycles += 1;

        debug!(
            tadr,
            id = ?tag.id(),
            qwc = tag.qwc(),
            addr = tag.addr(),
            irq = tag.irq(),
            "vif0 tag"
        );

        if self.channel.control.tag_transfer() {
            let offset = if self.session.stalled {
                (self.session.irq_offset as usize).min(2)
            } else {
                0
            };

            if !self.transfer(&mut *bus.vu, &words[2 + offset..], true) {
                return false;
            }
        }

        self.session.done |= self.channel.follow_tag(tag);
        self.chain_payload(bus);

        if self.channel.control.tag_interrupt() && tag.irq() {
            debug!("vif0 tag interrupt");
            self.session.done = true;
        }

        self.session.done
    }

    /// Starts the channel. Returns the delay before its first event, if one is needed.
    pub fn start(&mut self, bus: &mut Bus) -> Option<u64> {
        debug!(
            control = ?self.channel.control,
            madr = self.channel.madr,
            qwc = self.channel.qwc,
            tadr = self.channel.tadr,
            "starting vif0 dma"
        );

        self.cycles = 0;
        self.channel.control.set_started(true);
        self.regs.stat.set_fifo_count(u4::new(8));

        if !self.channel.control.mode().reads_tags() || self.channel.qwc > 0 {
            if !self.chain_payload(bus) {
                warn!("vif0 stalled during normal transfer");
                self.session.stalled = true;
                return Some(self.config.event_delay);
            }

            self.session.done = true;
            return Some(self.config.event_delay);
        }

        self.session.done = false;
        Some(0)
    }

    /// Handles a channel event. Returns the delay before the next one, if any.
    pub fn on_event(&mut self, bus: &mut Bus) -> Option<u64> {
        self.cycles = 0;

        if self.session.interrupt_pending() {
            self.regs.stat.set_interrupted(true);
            if bus.intc.is_masked(IntcLine::Vif0) {
                debug!("vif0 interrupt is masked");
            }

            bus.intc.raise(IntcLine::Vif0);
            self.session.irq -= 1;

            if self.regs.stat.is_stalled() {
                debug!("vif0 waiting for stall release");
                self.regs.stat.set_fifo_count(u4::new(0));
                self.channel.control.set_started(false);
                return None;
            }

            if self.channel.qwc > 0 || self.session.irq_offset > 0 {
                self.resume(bus);
                return Some(self.config.event_delay);
            }
        }

        if self.channel.control.mode() == Mode::Chain
            && !self.session.done
            && !self.session.stalled
        {
            if !bus.dmac.enabled() {
                warn!("vif0 dma is masked");
                return None;
            }

            if self.channel.qwc > 0 {
                self.chain_payload(bus);
            } else {
                self.follow_chain_link(bus);
            }

            return Some(self.config.event_delay);
        }

        if self.channel.qwc > 0 {
            debug!(qwc = self.channel.qwc, "vif0 ending with quadwords left");
        }

        self.channel.control.set_started(false);
        bus.dmac.raise_channel(DmaChannel::Vif0);
        self.regs.stat.set_fifo_count(u4::new(0));
        debug!("vif0 dma finished");

        None
    }

    /// Releases a stall (`FBRST.STC`). Returns the delay before the next event if the transfer
    /// was resumed.
    pub fn release_stall(&mut self, bus: &mut Bus) -> Option<u64> {
        self.cycles = 0;

        let stat = &mut self.regs.stat;
        let cancel = stat.is_stalled();

        stat.set_stalled_by_stop(false);
        stat.set_stalled_by_break(false);
        stat.set_stalled_by_interrupt(false);
        stat.set_interrupted(false);
        stat.set_tag_mismatch(false);
        stat.set_invalid_command(false);

        if !cancel || !self.session.stalled {
            return None;
        }

        debug!("releasing vif0 stall");
        self.resume(bus);
        self.channel.control.set_started(true);

        Some(self.cycles)
    }

    /// Continues a stalled transfer where it stopped.
    fn resume(&mut self, bus: &mut Bus) {
        if self.session.stall_on_tag {
            self.follow_chain_link(bus);
        } else {
            self.chain_payload(bus);
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        Vif0,
        dmac::{DmaChannel, Mode},
        memory::Memory,
        modules::{Bus, DmacModule, IntcLine, IntcModule, NopVuModule},
    };

    #[derive(Default)]
    struct TestDmac {
        memory: Memory,
        disabled: bool,
        finished: u32,
        bus_errors: u32,
    }

    impl DmacModule for TestDmac {
        fn resolve(&self, addr: u32) -> Option<&[u32]> {
            self.memory.resolve(addr)
        }

        fn enabled(&self) -> bool {
            !self.disabled
        }

        fn raise_channel(&mut self, channel: DmaChannel) {
            assert_eq!(channel, DmaChannel::Vif0);
            self.finished += 1;
        }

        fn bus_error(&mut self, _: DmaChannel) {
            self.bus_errors += 1;
        }
    }

    #[derive(Default)]
    struct TestIntc {
        raised: u32,
    }

    impl IntcModule for TestIntc {
        fn raise(&mut self, line: IntcLine) {
            assert_eq!(line, IntcLine::Vif0);
            self.raised += 1;
        }

        fn is_masked(&self, _: IntcLine) -> bool {
            false
        }
    }

    struct Harness {
        vif: Vif0,
        dmac: TestDmac,
        intc: TestIntc,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                vif: Vif0::default(),
                dmac: TestDmac::default(),
                intc: TestIntc::default(),
            }
        }

        fn write(&mut self, addr: u32, words: &[u32]) {
            self.dmac.memory.write_words(addr, words).unwrap();
        }

        fn with_bus<R>(&mut self, f: impl FnOnce(&mut Vif0, &mut Bus) -> R) -> R {
            let mut vu = NopVuModule;
            let mut bus = Bus {
                dmac: &mut self.dmac,
                intc: &mut self.intc,
                vu: &mut vu,
            };

            f(&mut self.vif, &mut bus)
        }

        /// Starts the channel and runs events until it stops scheduling them.
        fn run(&mut self) -> u32 {
            let mut events = 0;
            let mut next = self.with_bus(|vif, bus| vif.start(bus));
            while next.is_some() {
                events += 1;
                assert!(events < 1000, "channel never finished");
                next = self.with_bus(|vif, bus| vif.on_event(bus));
            }

            events
        }
    }

    fn tag(id: u32, qwc: u16, addr: u32, irq: bool) -> [u32; 4] {
        [(irq as u32) << 31 | id << 28 | qwc as u32, addr, 0, 0]
    }

    #[test]
    fn normal_transfer() {
        let mut h = Harness::new();
        h.write(0x1000, &[0x3000_0000, 1, 2, 3, 4, 0, 0, 0]);
        h.vif.channel.madr = 0x1000;
        h.vif.channel.qwc = 2;

        h.run();
        assert_eq!(h.vif.regs.row, [1, 2, 3, 4]);
        assert_eq!(h.vif.channel.qwc, 0);
        assert_eq!(h.vif.channel.madr, 0x1020);
        assert!(!h.vif.channel.control.started());
        assert_eq!(h.dmac.finished, 1);
        assert_eq!(h.vif.regs.stat.fifo_count().value(), 0);
    }

    #[test]
    fn unmapped_payload() {
        let mut h = Harness::new();
        h.vif.channel.madr = 0x1FFF_FFF0;
        h.vif.channel.qwc = 3;
        h.vif.session.cmd = 0x30;
        h.vif.session.remaining = 2;

        assert!(h.with_bus(|vif, bus| vif.chain_payload(bus)));
        assert_eq!(h.vif.channel.qwc, 0);
        assert_eq!(h.vif.session.cmd, 0);
        assert_eq!(h.vif.session.remaining, 0);
    }

    #[test]
    fn end_tag_finishes_chain() {
        let mut h = Harness::new();
        h.write(0x2000, &tag(7, 1, 0, false));
        h.write(0x2010, &[0x3100_0000, 5, 6, 7]);
        h.vif.channel.control.set_mode(Mode::Chain);
        h.vif.channel.tadr = 0x2000;

        assert!(h.with_bus(|vif, bus| vif.follow_chain_link(bus)));
        assert!(h.vif.session.done);
        assert_eq!(h.vif.regs.col, [5, 6, 7, 0]);
        assert_eq!(h.vif.channel.qwc, 0);
        assert!(h.with_bus(|vif, bus| vif.chain_payload(bus)));
    }

    #[test]
    fn chain_with_call_and_ret() {
        let mut h = Harness::new();
        // main: CALL sub, then END
        h.write(0x1000, &tag(5, 0, 0x3000, false));
        h.write(0x1010, &tag(7, 1, 0, false));
        h.write(0x1020, &[0x2000_0000, 0xFFFF_0000, 0, 0]);
        // sub: CNT with a STROW, then RET
        h.write(0x3000, &tag(1, 2, 0, false));
        h.write(0x3010, &[0x3000_0000, 1, 2, 3, 4, 0, 0, 0]);
        h.write(0x3030, &tag(6, 0, 0, false));

        h.vif.channel.control.set_mode(Mode::Chain);
        h.vif.channel.tadr = 0x1000;

        h.run();
        assert_eq!(h.vif.regs.row, [1, 2, 3, 4]);
        assert_eq!(h.vif.regs.mask, 0xFFFF_0000);
        assert!(h.vif.session.done);
        assert_eq!(h.vif.channel.control.stack_pointer().value(), 0);
        assert_eq!(h.dmac.finished, 1);
    }

    #[test]
    fn tag_interrupt_ends_chain() {
        let mut h = Harness::new();
        h.write(0x1000, &tag(1, 0, 0, true));
        h.write(0x1010, &tag(7, 0, 0, false));

        h.vif.channel.control.set_mode(Mode::Chain);
        h.vif.channel.control.set_tag_interrupt(true);
        h.vif.channel.tadr = 0x1000;

        h.run();
        assert_eq!(h.vif.channel.tadr, 0x1010);
        assert_eq!(h.dmac.finished, 1);
    }

    #[test]
    fn unmapped_tag_is_bus_error() {
        let mut h = Harness::new();
        h.vif.channel.control.set_mode(Mode::Chain);
        h.vif.channel.control.set_started(true);
        h.vif.channel.tadr = 0x1FFF_FFF0;

        assert!(h.with_bus(|vif, bus| vif.follow_chain_link(bus)));
        assert_eq!(h.dmac.bus_errors, 1);
        assert!(!h.vif.channel.control.started());
        assert!(h.vif.session.done);
    }

    #[test]
    fn disabled_dmac_is_not_rescheduled() {
        let mut h = Harness::new();
        h.write(0x1000, &tag(7, 0, 0, false));
        h.vif.channel.control.set_mode(Mode::Chain);
        h.vif.channel.tadr = 0x1000;
        h.dmac.disabled = true;

        assert_eq!(h.with_bus(|vif, bus| vif.start(bus)), Some(0));
        assert_eq!(h.with_bus(|vif, bus| vif.on_event(bus)), None);
        assert_eq!(h.vif.channel.tadr, 0x1000);
        assert_eq!(h.dmac.finished, 0);
    }

    #[test]
    fn interrupt_stalls_until_released() {
        let mut h = Harness::new();
        // NOP with interrupt, then STMASK
        h.write(0x1000, &[0x8000_0000, 0x2000_0000, 0x1234, 0]);
        h.vif.channel.madr = 0x1000;
        h.vif.channel.qwc = 1;

        let delay = h.with_bus(|vif, bus| vif.start(bus));
        assert_eq!(delay, Some(h.vif.config.event_delay));
        assert!(h.vif.session.stalled);
        assert_eq!(h.vif.regs.mask, 0);

        assert_eq!(h.with_bus(|vif, bus| vif.on_event(bus)), None);
        assert_eq!(h.intc.raised, 1);
        assert!(h.vif.regs.stat.interrupted());
        assert!(!h.vif.channel.control.started());

        let delay = h.with_bus(|vif, bus| vif.release_stall(bus));
        assert!(delay.is_some());
        assert_eq!(h.vif.regs.mask, 0x1234);
        assert!(h.vif.channel.control.started());
        assert!(!h.vif.regs.stat.is_stalled());
        assert_eq!(h.vif.channel.qwc, 0);

        assert_eq!(h.with_bus(|vif, bus| vif.on_event(bus)), None);
        assert_eq!(h.dmac.finished, 1);
    }

    #[test]
    fn release_without_stall_does_nothing() {
        let mut h = Harness::new();
        h.vif.regs.stat.set_invalid_command(true);

        assert_eq!(h.with_bus(|vif, bus| vif.release_stall(bus)), None);
        assert!(!h.vif.regs.stat.invalid_command());
    }

    #[test]
    fn tag_transfer_stall_resumes_on_tag() {
        let mut h = Harness::new();
        // tag upper half: MARK with interrupt, then STCYCL
        h.write(0x1000, &[7 << 28, 0, 0x8700_0005, 0x0100_0404]);
        h.vif.channel.control.set_mode(Mode::Chain);
        h.vif.channel.control.set_tag_transfer(true);
        h.vif.channel.tadr = 0x1000;

        h.run();
        assert_eq!(h.vif.regs.mark, 5);
        assert_eq!(h.vif.regs.cycle.cl(), 4);
        assert_eq!(h.vif.regs.cycle.wl(), 4);
        assert_eq!(h.intc.raised, 1);
        assert_eq!(h.dmac.finished, 1);
    }

    #[test]
    fn tag_at_top_of_address_space() {
        let mut h = Harness::new();
        h.write(0x8000_3FF0, &tag(1, 0, 0, false));
        h.vif.channel.control.set_mode(Mode::Chain);
        h.vif.channel.tadr = 0xFFFF_FFF0;

        assert!(!h.with_bus(|vif, bus| vif.follow_chain_link(bus)));
        assert_eq!(h.vif.channel.madr, 0);
        assert_eq!(h.vif.channel.tadr, 0);
        assert_eq!(h.dmac.bus_errors, 0);
    }
}
