//! The transfer loop.
use crate::{
    Vif0,
    command::{self, Command, DATA_LUT, SETUP_LUT},
    modules::VuModule,
    regs::PipelineState,
};
use tracing::{debug, trace};

impl Vif0 {
    /// Feeds `data` through the command stream. `is_tag` is set when `data` is the upper half of a
    /// DMA tag rather than channel payload.
    ///
    /// Returns `false` if the transfer stalled on an interrupt before consuming all of `data`. The
    /// caller resumes it by calling again with the data starting at the first unconsumed word,
    /// which for payload is `irq_offset` words into the quadword at `madr`. Payload may also be
    /// split at any word without stalling: the words of an incomplete quadword are carried in
    /// `irq_offset` until the quadword is finished.
    pub fn transfer(&mut self, vu: &mut dyn VuModule, mut data: &[u32], is_tag: bool) -> bool {
        let size = data.len() as u32;
        let mut transferred = if self.session.stalled || !is_tag {
            self.session.irq_offset
        } else {
            0
        };

        self.session.stall_on_tag = false;
        self.session.stalled = false;
        self.session.packet_remaining = size;

        while let Some(&word) = data.first() {
            if self.session.cmd != 0 {
                self.regs.stat.set_pipeline(PipelineState::Transferring);

                let handler = DATA_LUT[(self.session.cmd & 0x7F) as usize];
                let consumed = handler(self, vu, data);

                data = &data[consumed..];
                self.session.packet_remaining -= consumed as u32;
                trace!(consumed, cmd = self.session.cmd, "vif0 payload");

                if self.session.cmd == 0 {
                    self.regs.stat.set_pipeline(PipelineState::Idle);
                }

                continue;
            }

            if self.session.irq > 0 {
                break;
            }

            self.session.cmd = (word >> 24) as u8;
            self.regs.code = word;
            self.regs.stat.set_pipeline(PipelineState::Decoding);

            debug!(
                cmd = command::name(self.session.cmd),
                num = (word >> 16) as u8,
                imm = word as u16,
                "vif0 command {word:08X}"
            );

            let handler = SETUP_LUT[(self.session.cmd & 0x7F) as usize];
            handler(self, vu);

            data = &data[1..];
            self.session.packet_remaining -= 1;

            if self.session.cmd & 0x80 != 0 {
                self.session.cmd &= 0x7F;

                if !self.regs.err.mask_interrupt() {
                    self.session.irq += 1;
                    debug!(irq = self.session.irq, "interrupt requested by vif0 command");

                    if is_tag && self.session.remaining <= self.session.packet_remaining {
                        self.session.stall_on_tag = true;
                    }

                    if self.session.remaining == 0 {
                        break;
                    }
                }
            }
        }

        transferred += size - self.session.packet_remaining;
        self.cycles += (transferred >> 2) as u64 * self.config.bias;

        if self.session.interrupt_pending() {
            self.session.stalled = true;

            if (self.regs.code >> 24) as u8 & 0x7F != Command::Mark as u8 {
                self.regs.stat.set_stalled_by_interrupt(true);
            }

            self.session.irq_offset = transferred % 4;
            if !is_tag {
                self.advance_payload(transferred / 4);
            }

            debug!(
                irq_offset = self.session.irq_offset,
                remaining = self.session.packet_remaining,
                "vif0 stalled"
            );

            return false;
        }

        self.regs.stat.set_pipeline(if self.session.cmd != 0 {
            PipelineState::Waiting
        } else {
            PipelineState::Idle
        });

        // words of a partially consumed quadword count towards the next call
        self.session.irq_offset = if is_tag { 0 } else { transferred % 4 };
        if !is_tag {
            self.advance_payload(transferred / 4);
        }

        true
    }

    /// Moves `madr` and `qwc` past `quadwords` consumed quadwords.
    fn advance_payload(&mut self, quadwords: u32) {
        self.channel.madr = self.channel.madr.wrapping_add(quadwords << 4);
        self.channel.qwc = self.channel.qwc.saturating_sub(quadwords);
    }
}
