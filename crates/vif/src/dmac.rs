//! DMA channel registers and chain descriptors.
use bitos::{bitos, integer::u2};

/// DMA channels of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DmaChannel {
    Vif0 = 0,
    Vif1 = 1,
    Gif = 2,
    FromIpu = 3,
    ToIpu = 4,
    Sif0 = 5,
    Sif1 = 6,
    Sif2 = 7,
    FromSpr = 8,
    ToSpr = 9,
}

#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal = 0b00,
    Chain = 0b01,
    Interleave = 0b10,
    Reserved = 0b11,
}

impl Mode {
    /// Whether the channel reads tags, as opposed to a single block at MADR.
    pub fn reads_tags(self) -> bool {
        matches!(self, Self::Chain | Self::Reserved)
    }
}

/// The `CHCR` register.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelControl {
    #[bits(0)]
    pub from_memory: bool,
    #[bits(2..4)]
    pub mode: Mode,
    /// Address stack pointer (ASP).
    #[bits(4..6)]
    pub stack_pointer: u2,
    /// Transfer the upper half of each tag to the peripheral (TTE).
    #[bits(6)]
    pub tag_transfer: bool,
    /// Honor the IRQ bit of tags (TIE).
    #[bits(7)]
    pub tag_interrupt: bool,
    /// Channel is running (STR).
    #[bits(8)]
    pub started: bool,
    /// Upper 16 bits of the last tag read.
    #[bits(16..32)]
    pub tag: u16,
}

#[bitos(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagId {
    #[default]
    Refe = 0,
    Cnt = 1,
    Next = 2,
    Ref = 3,
    Refs = 4,
    Call = 5,
    Ret = 6,
    End = 7,
}

/// Lower 64 bits of a source chain tag.
#[bitos(64)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Tag {
    #[bits(0..16)]
    pub qwc: u16,
    #[bits(26..28)]
    pub priority: u2,
    #[bits(28..31)]
    pub id: TagId,
    #[bits(31)]
    pub irq: bool,
    /// Address field, including the scratchpad select bit.
    #[bits(32..64)]
    pub addr: u32,
}

static_assertions::assert_eq_size!(Tag, u64);

impl Tag {
    pub fn from_words(low: u32, high: u32) -> Self {
        Self::from_bits(low as u64 | ((high as u64) << 32))
    }

    /// Upper half of the first tag word, as latched into `CHCR`.
    pub fn control_bits(self) -> u16 {
        (self.to_bits() >> 16) as u16
    }
}

/// Registers of a source DMA channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Channel {
    pub control: ChannelControl,
    pub madr: u32,
    /// Quadwords left in the current block.
    pub qwc: u32,
    pub tadr: u32,
    /// Address stack for CALL and RET tags.
    pub asr: [u32; 2],
}

impl Channel {
    /// Applies source chain semantics of `tag`, which was read at `tadr` and has already loaded
    /// `qwc` and `madr`. Returns whether the chain ends after this block.
    pub fn follow_tag(&mut self, tag: Tag) -> bool {
        match tag.id() {
            TagId::Refe => true,
            TagId::Cnt => {
                self.madr = self.tadr.wrapping_add(16);
                self.tadr = self.madr.wrapping_add(self.qwc << 4);
                false
            }
            TagId::Next => {
                let next = self.madr;
                self.madr = self.tadr.wrapping_add(16);
                self.tadr = next;
                false
            }
            TagId::Ref | TagId::Refs => {
                self.tadr = self.tadr.wrapping_add(16);
                false
            }
            TagId::Call => {
                let next = self.madr;
                self.madr = self.tadr.wrapping_add(16);

                let sp = self.control.stack_pointer().value();
                let Some(slot) = self.asr.get_mut(sp as usize) else {
                    tracing::warn!("dma call stack overflow, ending chain");
                    return true;
                };

                *slot = self.madr.wrapping_add(self.qwc << 4);
                self.control.set_stack_pointer(u2::new(sp + 1));
                self.tadr = next;
                false
            }
            TagId::Ret => {
                self.madr = self.tadr.wrapping_add(16);

                let sp = self.control.stack_pointer().value();
                if sp == 0 {
                    return true;
                }

                let slot = &mut self.asr[(sp as usize - 1).min(1)];
                self.tadr = std::mem::take(slot);
                self.control.set_stack_pointer(u2::new(sp - 1));
                false
            }
            TagId::End => {
                self.madr = self.tadr.wrapping_add(16);
                true
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn channel(tadr: u32, tag: Tag) -> Channel {
        Channel {
            qwc: tag.qwc() as u32,
            madr: tag.addr(),
            tadr,
            ..Default::default()
        }
    }

    #[test]
    fn tag_fields() {
        let tag = Tag::from_words(0x8000_0004 | (5 << 28), 0x1234_5670);
        assert_eq!(tag.qwc(), 4);
        assert_eq!(tag.id(), TagId::Call);
        assert!(tag.irq());
        assert_eq!(tag.addr(), 0x1234_5670);
        assert_eq!(tag.control_bits(), 0xD000);
    }

    #[test]
    fn cnt_follows_block() {
        let tag = Tag::from_words((1 << 28) | 2, 0);
        let mut ch = channel(0x1000, tag);
        assert!(!ch.follow_tag(tag));
        assert_eq!(ch.madr, 0x1010);
        assert_eq!(ch.tadr, 0x1030);
    }

    #[test]
    fn next_and_ref() {
        let tag = Tag::from_words(2 << 28, 0x4000);
        let mut ch = channel(0x1000, tag);
        assert!(!ch.follow_tag(tag));
        assert_eq!(ch.madr, 0x1010);
        assert_eq!(ch.tadr, 0x4000);

        let tag = Tag::from_words((3 << 28) | 1, 0x8000);
        let mut ch = channel(0x1000, tag);
        assert!(!ch.follow_tag(tag));
        assert_eq!(ch.madr, 0x8000);
        assert_eq!(ch.tadr, 0x1010);
    }

    #[test]
    fn call_and_ret_use_stack() {
        let call = Tag::from_words((5 << 28) | 1, 0x4000);
        let mut ch = channel(0x1000, call);
        assert!(!ch.follow_tag(call));
        assert_eq!(ch.asr[0], 0x1020);
        assert_eq!(ch.control.stack_pointer().value(), 1);
        assert_eq!(ch.tadr, 0x4000);

        let nested = Tag::from_words(5 << 28, 0x5000);
        ch.madr = nested.addr();
        ch.qwc = 0;
        assert!(!ch.follow_tag(nested));
        assert_eq!(ch.asr[1], 0x4010);
        assert_eq!(ch.control.stack_pointer().value(), 2);

        ch.madr = 0x6000;
        assert!(ch.follow_tag(nested), "third call overflows the stack");

        let ret = Tag::from_words(6 << 28, 0);
        ch.tadr = 0x5000;
        assert!(!ch.follow_tag(ret));
        assert_eq!(ch.tadr, 0x4010);
        assert!(!ch.follow_tag(ret));
        assert_eq!(ch.tadr, 0x1020);
        assert!(ch.follow_tag(ret), "ret with an empty stack ends the chain");
    }

    #[test]
    fn end_tags() {
        let tag = Tag::from_words(7 << 28, 0);
        let mut ch = channel(0x1000, tag);
        assert!(ch.follow_tag(tag));
        assert_eq!(ch.madr, 0x1010);

        let tag = Tag::from_words(0, 0x2000);
        let mut ch = channel(0x1000, tag);
        assert!(ch.follow_tag(tag));
        assert_eq!(ch.madr, 0x2000);
    }

    #[test]
    fn addresses_wrap() {
        let tag = Tag::from_words((1 << 28) | 1, 0);
        let mut ch = channel(0xFFFF_FFF0, tag);
        assert!(!ch.follow_tag(tag));
        assert_eq!(ch.madr, 0);
        assert_eq!(ch.tadr, 0x10);

        let tag = Tag::from_words(3 << 28, 0x2000);
        let mut ch = channel(0xFFFF_FFF0, tag);
        assert!(!ch.follow_tag(tag));
        assert_eq!(ch.tadr, 0);

        let tag = Tag::from_words((5 << 28) | 1, 0x3000);
        let mut ch = channel(0xFFFF_FFE0, tag);
        assert!(!ch.follow_tag(tag));
        assert_eq!(ch.madr, 0xFFFF_FFF0);
        assert_eq!(ch.asr[0], 0);
    }
}
