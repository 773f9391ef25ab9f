use comfy_table::{
    Cell, CellAlignment, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};
use strum::VariantArray;
use vif::{command, system::System};
use vumicro::{
    Ins, Mnemonic, RegUsage,
    opcodes::Placement,
    usage::{Specials, VfAccess},
};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .iter()
                .map(|name| Cell::new(name).set_alignment(CellAlignment::Center)),
        );

    table
}

fn specials(specials: Specials) -> String {
    let names = [
        (specials.acc(), "ACC"),
        (specials.q(), "Q"),
        (specials.p(), "P"),
        (specials.i(), "I"),
        (specials.r(), "R"),
        (specials.status(), "STATUS"),
        (specials.mac(), "MAC"),
        (specials.clip(), "CLIP"),
    ];

    let set: Vec<_> = names
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();

    if set.is_empty() {
        "-".to_owned()
    } else {
        set.join(", ")
    }
}

fn vi(mask: u16) -> String {
    let regs: Vec<_> = (0..16)
        .filter(|i| mask & (1 << i) != 0)
        .map(|i| format!("vi{i}"))
        .collect();

    if regs.is_empty() {
        "-".to_owned()
    } else {
        regs.join(", ")
    }
}

fn vf(access: Option<VfAccess>) -> String {
    access.map_or_else(|| "-".to_owned(), |a| format!("vf{}.{:?}", a.reg, a.mask))
}

/// Prints the decoded form and register usage of a micro instruction.
pub fn usage(ins: Ins, op: Option<Mnemonic>, usage: &RegUsage) {
    let mut info = table(&["Field", "Value"]);
    let mut row = |name: &str, value: String| {
        info.add_row(vec![Cell::new(name), Cell::new(value)]);
    };

    row("Code", format!("0x{:08X}", ins.code()));
    row(
        "Mnemonic",
        op.map_or_else(|| "unknown".to_owned(), |op| op.to_string()),
    );
    row("Pipe", format!("{:?}", usage.pipe));
    row("VF write", vf(usage.vf_write));
    row("VF read", format!("{}, {}", vf(usage.vf_read[0]), vf(usage.vf_read[1])));
    row("VI read", vi(usage.vi_read));
    row("VI write", vi(usage.vi_write));
    row("Reads", specials(usage.reads));
    row("Writes", specials(usage.writes));
    row("Latency", usage.cycles.to_string());

    println!("{info}");
}

fn placement(placement: Placement) -> (&'static str, String) {
    match placement {
        Placement::Upper(i) => ("upper", format!("0x{i:02X}")),
        Placement::UpperFd(t, i) => ("upper", format!("FD_{t:02b} 0x{i:02X}")),
        Placement::Lower(i) => ("lower", format!("0x{i:02X}")),
        Placement::LowerOp(i) => ("lower", format!("0x40 0x{i:02X}")),
        Placement::LowerT3(t, i) => ("lower", format!("0x40 T3_{t:02b} 0x{i:02X}")),
    }
}

/// Prints every mnemonic with its position in the dispatch tables.
pub fn tables() {
    let mut ops = table(&["Mnemonic", "Pipeline", "Slot"]);
    for &op in Mnemonic::VARIANTS {
        let (pipeline, slot) = placement(op.placement());
        ops.add_row(vec![
            Cell::new(op.name()),
            Cell::new(pipeline).set_alignment(CellAlignment::Center),
            Cell::new(slot),
        ]);
    }

    println!("{ops}");
    println!("{} mnemonics", Mnemonic::VARIANTS.len());
}

/// Prints the state of VIF0 after a transfer.
pub fn transfer(sys: &System, elapsed: u64, interrupts: u32) {
    let vif = &sys.vif0;
    let regs = &vif.regs;
    let channel = &vif.channel;

    let mut info = table(&["Register", "Value"]);
    let mut row = |name: &str, value: String| {
        info.add_row(vec![Cell::new(name), Cell::new(value)]);
    };

    row("CHCR", format!("0x{:08X}", channel.control.to_bits()));
    row("MADR", format!("0x{:08X}", channel.madr));
    row("QWC", channel.qwc.to_string());
    row("TADR", format!("0x{:08X}", channel.tadr));
    row("STAT", format!("0x{:08X}", regs.stat.to_bits()));
    row("CYCLE", format!("CL {} WL {}", regs.cycle.cl(), regs.cycle.wl()));
    row("MODE", format!("{:?}", regs.mode));
    row("MASK", format!("0x{:08X}", regs.mask));
    row("ROW", format!("{:08X?}", regs.row));
    row("COL", format!("{:08X?}", regs.col));
    row(
        "CODE",
        format!("0x{:08X} ({})", regs.code, command::name((regs.code >> 24) as u8)),
    );
    row("ITOP", format!("0x{:03X}", regs.itop));
    row("MARK", format!("0x{:04X}", regs.mark));
    row("NUM", regs.num.to_string());

    println!("{info}");

    let mut summary = table(&["Elapsed", "VIF0 cycles", "Interrupts", "Pending", "Finished"]);
    summary.add_row(vec![
        Cell::new(elapsed),
        Cell::new(sys.vif0_cycles),
        Cell::new(interrupts),
        Cell::new(vif.session.irq),
        Cell::new(sys.dmac.stat & 1 != 0),
    ]);

    println!("{summary}");

    if sys.dmac.bus_error {
        println!("bus error");
    }
}
