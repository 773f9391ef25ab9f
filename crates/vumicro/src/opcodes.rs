use crate::{Ins, State, usage::RegUsage};
use strum::{IntoStaticStr, VariantArray};

/// Position of a mnemonic in the dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Upper table, indexed by bits 0..6.
    Upper(u8),
    /// One of the four upper `FD` tables, indexed by bits 6..11.
    UpperFd(u8, u8),
    /// Lower table, indexed by bits 25..32.
    Lower(u8),
    /// Lower `0x40` class table, indexed by bits 0..6.
    LowerOp(u8),
    /// One of the four lower `T3` tables, indexed by bits 6..11.
    LowerT3(u8, u8),
}

/// Execution handler of a micro instruction.
pub type ExecFn<E> = for<'a, 'b> fn(&'a mut E, &'b mut State, Ins);
/// Register usage handler of a micro instruction.
pub type AnalyzeFn = fn(Ins) -> RegUsage;

macro_rules! micro_ops {
    ($(
        $name:ident($exec:ident, $text:literal) @ $kind:ident($($idx:literal),+) => $analyze:ident;
    )*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, VariantArray, IntoStaticStr)]
        pub enum Mnemonic {
            $(
                #[strum(serialize = $text)]
                $name,
            )*
        }

        impl Mnemonic {
            pub fn placement(self) -> Placement {
                match self {
                    $(Self::$name => Placement::$kind($($idx),+),)*
                }
            }

            pub fn analyzer(self) -> AnalyzeFn {
                match self {
                    $(Self::$name => crate::usage::$analyze as AnalyzeFn,)*
                }
            }

            pub fn executor<E: Execute>(self) -> ExecFn<E> {
                match self {
                    $(Self::$name => <E as Execute>::$exec as ExecFn<E>,)*
                }
            }
        }

        /// Semantics of micro instructions.
        ///
        /// Every instruction defaults to [`Execute::fallback`], so an implementor only has to
        /// provide the instructions it actually models.
        pub trait Execute: Sized {
            fn fallback(&mut self, state: &mut State, op: Mnemonic, ins: Ins);

            fn unknown(&mut self, _: &mut State, ins: Ins) {
                tracing::warn!("unknown micro instruction {ins:?}");
            }

            $(
                fn $exec(&mut self, state: &mut State, ins: Ins) {
                    self.fallback(state, Mnemonic::$name, ins)
                }
            )*
        }
    };
}

micro_ops! {
    // upper, broadcast
    AddX(add_x, "ADDx") @ Upper(0x00) => fmac_bc;
    AddY(add_y, "ADDy") @ Upper(0x01) => fmac_bc;
    AddZ(add_z, "ADDz") @ Upper(0x02) => fmac_bc;
    AddW(add_w, "ADDw") @ Upper(0x03) => fmac_bc;
    SubX(sub_x, "SUBx") @ Upper(0x04) => fmac_bc;
    SubY(sub_y, "SUBy") @ Upper(0x05) => fmac_bc;
    SubZ(sub_z, "SUBz") @ Upper(0x06) => fmac_bc;
    SubW(sub_w, "SUBw") @ Upper(0x07) => fmac_bc;
    MaddX(madd_x, "MADDx") @ Upper(0x08) => fmac_bc_acc;
    MaddY(madd_y, "MADDy") @ Upper(0x09) => fmac_bc_acc;
    MaddZ(madd_z, "MADDz") @ Upper(0x0A) => fmac_bc_acc;
    MaddW(madd_w, "MADDw") @ Upper(0x0B) => fmac_bc_acc;
    MsubX(msub_x, "MSUBx") @ Upper(0x0C) => fmac_bc_acc;
    MsubY(msub_y, "MSUBy") @ Upper(0x0D) => fmac_bc_acc;
    MsubZ(msub_z, "MSUBz") @ Upper(0x0E) => fmac_bc_acc;
    MsubW(msub_w, "MSUBw") @ Upper(0x0F) => fmac_bc_acc;
    MaxX(max_x, "MAXx") @ Upper(0x10) => minmax_bc;
    MaxY(max_y, "MAXy") @ Upper(0x11) => minmax_bc;
    MaxZ(max_z, "MAXz") @ Upper(0x12) => minmax_bc;
    MaxW(max_w, "MAXw") @ Upper(0x13) => minmax_bc;
    MiniX(mini_x, "MINIx") @ Upper(0x14) => minmax_bc;
    MiniY(mini_y, "MINIy") @ Upper(0x15) => minmax_bc;
    MiniZ(mini_z, "MINIz") @ Upper(0x16) => minmax_bc;
    MiniW(mini_w, "MINIw") @ Upper(0x17) => minmax_bc;
    MulX(mul_x, "MULx") @ Upper(0x18) => fmac_bc;
    MulY(mul_y, "MULy") @ Upper(0x19) => fmac_bc;
    MulZ(mul_z, "MULz") @ Upper(0x1A) => fmac_bc;
    MulW(mul_w, "MULw") @ Upper(0x1B) => fmac_bc;

    // upper, q and i
    MulQ(mul_q, "MULq") @ Upper(0x1C) => fmac_q;
    MaxI(max_i, "MAXi") @ Upper(0x1D) => minmax_i;
    MulI(mul_i, "MULi") @ Upper(0x1E) => fmac_i;
    MiniI(mini_i, "MINIi") @ Upper(0x1F) => minmax_i;
    AddQ(add_q, "ADDq") @ Upper(0x20) => fmac_q;
    MaddQ(madd_q, "MADDq") @ Upper(0x21) => fmac_q_acc;
    AddI(add_i, "ADDi") @ Upper(0x22) => fmac_i;
    MaddI(madd_i, "MADDi") @ Upper(0x23) => fmac_i_acc;
    SubQ(sub_q, "SUBq") @ Upper(0x24) => fmac_q;
    MsubQ(msub_q, "MSUBq") @ Upper(0x25) => fmac_q_acc;
    SubI(sub_i, "SUBi") @ Upper(0x26) => fmac_i;
    MsubI(msub_i, "MSUBi") @ Upper(0x27) => fmac_i_acc;

    // upper, vector
    Add(add, "ADD") @ Upper(0x28) => fmac;
    Madd(madd, "MADD") @ Upper(0x29) => fmac_acc;
    Mul(mul, "MUL") @ Upper(0x2A) => fmac;
    Max(max, "MAX") @ Upper(0x2B) => minmax;
    Sub(sub, "SUB") @ Upper(0x2C) => fmac;
    Msub(msub, "MSUB") @ Upper(0x2D) => fmac_acc;
    Opmsub(opmsub, "OPMSUB") @ Upper(0x2E) => opmsub;
    Mini(mini, "MINI") @ Upper(0x2F) => minmax;

    // upper, FD_00
    AddaX(adda_x, "ADDAx") @ UpperFd(0, 0x00) => acc_bc;
    SubaX(suba_x, "SUBAx") @ UpperFd(0, 0x01) => acc_bc;
    MaddaX(madda_x, "MADDAx") @ UpperFd(0, 0x02) => acc_bc_acc;
    MsubaX(msuba_x, "MSUBAx") @ UpperFd(0, 0x03) => acc_bc_acc;
    Itof0(itof0, "ITOF0") @ UpperFd(0, 0x04) => convert;
    Ftoi0(ftoi0, "FTOI0") @ UpperFd(0, 0x05) => convert;
    MulaX(mula_x, "MULAx") @ UpperFd(0, 0x06) => acc_bc;
    MulaQ(mula_q, "MULAq") @ UpperFd(0, 0x07) => acc_q;
    AddaQ(adda_q, "ADDAq") @ UpperFd(0, 0x08) => acc_q;
    SubaQ(suba_q, "SUBAq") @ UpperFd(0, 0x09) => acc_q;
    Adda(adda, "ADDA") @ UpperFd(0, 0x0A) => acc;
    Suba(suba, "SUBA") @ UpperFd(0, 0x0B) => acc;

    // upper, FD_01
    AddaY(adda_y, "ADDAy") @ UpperFd(1, 0x00) => acc_bc;
    SubaY(suba_y, "SUBAy") @ UpperFd(1, 0x01) => acc_bc;
    MaddaY(madda_y, "MADDAy") @ UpperFd(1, 0x02) => acc_bc_acc;
    MsubaY(msuba_y, "MSUBAy") @ UpperFd(1, 0x03) => acc_bc_acc;
    Itof4(itof4, "ITOF4") @ UpperFd(1, 0x04) => convert;
    Ftoi4(ftoi4, "FTOI4") @ UpperFd(1, 0x05) => convert;
    MulaY(mula_y, "MULAy") @ UpperFd(1, 0x06) => acc_bc;
    Abs(abs, "ABS") @ UpperFd(1, 0x07) => convert;
    MaddaQ(madda_q, "MADDAq") @ UpperFd(1, 0x08) => acc_q_acc;
    MsubaQ(msuba_q, "MSUBAq") @ UpperFd(1, 0x09) => acc_q_acc;
    Madda(madda, "MADDA") @ UpperFd(1, 0x0A) => acc_acc;
    Msuba(msuba, "MSUBA") @ UpperFd(1, 0x0B) => acc_acc;

    // upper, FD_10
    AddaZ(adda_z, "ADDAz") @ UpperFd(2, 0x00) => acc_bc;
    SubaZ(suba_z, "SUBAz") @ UpperFd(2, 0x01) => acc_bc;
    MaddaZ(madda_z, "MADDAz") @ UpperFd(2, 0x02) => acc_bc_acc;
    MsubaZ(msuba_z, "MSUBAz") @ UpperFd(2, 0x03) => acc_bc_acc;
    Itof12(itof12, "ITOF12") @ UpperFd(2, 0x04) => convert;
    Ftoi12(ftoi12, "FTOI12") @ UpperFd(2, 0x05) => convert;
    MulaZ(mula_z, "MULAz") @ UpperFd(2, 0x06) => acc_bc;
    MulaI(mula_i, "MULAi") @ UpperFd(2, 0x07) => acc_i;
    AddaI(adda_i, "ADDAi") @ UpperFd(2, 0x08) => acc_i;
    SubaI(suba_i, "SUBAi") @ UpperFd(2, 0x09) => acc_i;
    Mula(mula, "MULA") @ UpperFd(2, 0x0A) => acc;
    Opmula(opmula, "OPMULA") @ UpperFd(2, 0x0B) => opmula;

    // upper, FD_11
    AddaW(adda_w, "ADDAw") @ UpperFd(3, 0x00) => acc_bc;
    SubaW(suba_w, "SUBAw") @ UpperFd(3, 0x01) => acc_bc;
    MaddaW(madda_w, "MADDAw") @ UpperFd(3, 0x02) => acc_bc_acc;
    MsubaW(msuba_w, "MSUBAw") @ UpperFd(3, 0x03) => acc_bc_acc;
    Itof15(itof15, "ITOF15") @ UpperFd(3, 0x04) => convert;
    Ftoi15(ftoi15, "FTOI15") @ UpperFd(3, 0x05) => convert;
    MulaW(mula_w, "MULAw") @ UpperFd(3, 0x06) => acc_bc;
    Clip(clip, "CLIP") @ UpperFd(3, 0x07) => clip;
    MaddaI(madda_i, "MADDAi") @ UpperFd(3, 0x08) => acc_i_acc;
    MsubaI(msuba_i, "MSUBAi") @ UpperFd(3, 0x09) => acc_i_acc;
    Nop(nop, "NOP") @ UpperFd(3, 0x0B) => nop;

    // lower
    Lq(lq, "LQ") @ Lower(0x00) => load_quad;
    Sq(sq, "SQ") @ Lower(0x01) => store_quad;
    Ilw(ilw, "ILW") @ Lower(0x04) => load_int;
    Isw(isw, "ISW") @ Lower(0x05) => store_int;
    Iaddiu(iaddiu, "IADDIU") @ Lower(0x08) => ialu_imm;
    Isubiu(isubiu, "ISUBIU") @ Lower(0x09) => ialu_imm;
    Fceq(fceq, "FCEQ") @ Lower(0x10) => clip_test;
    Fcset(fcset, "FCSET") @ Lower(0x11) => clip_set;
    Fcand(fcand, "FCAND") @ Lower(0x12) => clip_test;
    Fcor(fcor, "FCOR") @ Lower(0x13) => clip_test;
    Fseq(fseq, "FSEQ") @ Lower(0x14) => status_test;
    Fsset(fsset, "FSSET") @ Lower(0x15) => status_set;
    Fsand(fsand, "FSAND") @ Lower(0x16) => status_test;
    Fsor(fsor, "FSOR") @ Lower(0x17) => status_test;
    Fmeq(fmeq, "FMEQ") @ Lower(0x18) => mac_test;
    Fmand(fmand, "FMAND") @ Lower(0x1A) => mac_test;
    Fmor(fmor, "FMOR") @ Lower(0x1B) => mac_test;
    Fcget(fcget, "FCGET") @ Lower(0x1C) => clip_get;
    B(b, "B") @ Lower(0x20) => branch;
    Bal(bal, "BAL") @ Lower(0x21) => branch_link;
    Jr(jr, "JR") @ Lower(0x24) => jump;
    Jalr(jalr, "JALR") @ Lower(0x25) => jump_link;
    Ibeq(ibeq, "IBEQ") @ Lower(0x28) => branch_compare;
    Ibne(ibne, "IBNE") @ Lower(0x29) => branch_compare;
    Ibltz(ibltz, "IBLTZ") @ Lower(0x2C) => branch_zero;
    Ibgtz(ibgtz, "IBGTZ") @ Lower(0x2D) => branch_zero;
    Iblez(iblez, "IBLEZ") @ Lower(0x2E) => branch_zero;
    Ibgez(ibgez, "IBGEZ") @ Lower(0x2F) => branch_zero;

    // lower, 0x40 class
    Iadd(iadd, "IADD") @ LowerOp(0x30) => ialu;
    Isub(isub, "ISUB") @ LowerOp(0x31) => ialu;
    Iaddi(iaddi, "IADDI") @ LowerOp(0x32) => ialu_imm;
    Iand(iand, "IAND") @ LowerOp(0x34) => ialu;
    Ior(ior, "IOR") @ LowerOp(0x35) => ialu;

    // lower, T3_00
    Move(mov, "MOVE") @ LowerT3(0, 0x0C) => vf_move;
    Lqi(lqi, "LQI") @ LowerT3(0, 0x0D) => load_quad_update;
    Div(div, "DIV") @ LowerT3(0, 0x0E) => div;
    Mtir(mtir, "MTIR") @ LowerT3(0, 0x0F) => move_to_int;
    Rnext(rnext, "RNEXT") @ LowerT3(0, 0x10) => random_next;
    Mfp(mfp, "MFP") @ LowerT3(0, 0x19) => move_from_p;
    Xtop(xtop, "XTOP") @ LowerT3(0, 0x1A) => xtop;
    Xgkick(xgkick, "XGKICK") @ LowerT3(0, 0x1B) => xgkick;
    Esadd(esadd, "ESADD") @ LowerT3(0, 0x1C) => esadd;
    EatanXy(eatan_xy, "EATANxy") @ LowerT3(0, 0x1D) => eatanxy;
    Esqrt(esqrt, "ESQRT") @ LowerT3(0, 0x1E) => esqrt;
    Esin(esin, "ESIN") @ LowerT3(0, 0x1F) => esin;

    // lower, T3_01
    Mr32(mr32, "MR32") @ LowerT3(1, 0x0C) => vf_move;
    Sqi(sqi, "SQI") @ LowerT3(1, 0x0D) => store_quad_update;
    Sqrt(sqrt, "SQRT") @ LowerT3(1, 0x0E) => sqrt;
    Mfir(mfir, "MFIR") @ LowerT3(1, 0x0F) => move_from_int;
    Rget(rget, "RGET") @ LowerT3(1, 0x10) => random_get;
    Xitop(xitop, "XITOP") @ LowerT3(1, 0x1A) => xtop;
    Ersadd(ersadd, "ERSADD") @ LowerT3(1, 0x1C) => ersadd;
    EatanXz(eatan_xz, "EATANxz") @ LowerT3(1, 0x1D) => eatanxz;
    Ersqrt(ersqrt, "ERSQRT") @ LowerT3(1, 0x1E) => ersqrt;
    Eatan(eatan, "EATAN") @ LowerT3(1, 0x1F) => eatan;

    // lower, T3_10
    Lqd(lqd, "LQD") @ LowerT3(2, 0x0D) => load_quad_update;
    Rsqrt(rsqrt, "RSQRT") @ LowerT3(2, 0x0E) => rsqrt;
    Ilwr(ilwr, "ILWR") @ LowerT3(2, 0x0F) => load_int;
    Rinit(rinit, "RINIT") @ LowerT3(2, 0x10) => random_set;
    Eleng(eleng, "ELENG") @ LowerT3(2, 0x1C) => eleng;
    Esum(esum, "ESUM") @ LowerT3(2, 0x1D) => esum;
    Ercpr(ercpr, "ERCPR") @ LowerT3(2, 0x1E) => ercpr;
    Eexp(eexp, "EEXP") @ LowerT3(2, 0x1F) => eexp;

    // lower, T3_11
    Sqd(sqd, "SQD") @ LowerT3(3, 0x0D) => store_quad_update;
    Waitq(waitq, "WAITQ") @ LowerT3(3, 0x0E) => wait_q;
    Iswr(iswr, "ISWR") @ LowerT3(3, 0x0F) => store_int;
    Rxor(rxor, "RXOR") @ LowerT3(3, 0x10) => random_xor;
    Erleng(erleng, "ERLENG") @ LowerT3(3, 0x1C) => erleng;
    Waitp(waitp, "WAITP") @ LowerT3(3, 0x1E) => wait_p;
}

impl Mnemonic {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Whether this mnemonic belongs to the upper pipeline.
    pub fn is_upper(self) -> bool {
        matches!(
            self.placement(),
            Placement::Upper(_) | Placement::UpperFd(..)
        )
    }
}

impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
