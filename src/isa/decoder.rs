use crate::isa::instruction::Instruction;
use crate::isa::op::{
    AluKind, BranchCond, CvtSrc, Decoded, FpArithKind, FpCond, FpFmt, FpUnaryKind, ImmAluKind,
    LoadKind, MulDivKind, Op, RoundMode, ShiftKind, StoreKind, TrapCond,
};

const OP_SPECIAL: u32 = 0x00;
const OP_REGIMM: u32 = 0x01;
const OP_COP0: u32 = 0x10;
const OP_COP1: u32 = 0x11;
const OP_SPECIAL2: u32 = 0x1C;
const OP_SPECIAL3: u32 = 0x1F;

const FMT_SINGLE: u32 = 0x10;
const FMT_DOUBLE: u32 = 0x11;
const FMT_WORD: u32 = 0x14;

#[inline]
fn branch_target(pc: u32, simm: i32) -> u32 {
    pc.wrapping_add(4).wrapping_add((simm << 2) as u32)
}

fn fp_fmt(bits: u32) -> Option<FpFmt> {
    match bits {
        FMT_SINGLE => Some(FpFmt::Single),
        FMT_DOUBLE => Some(FpFmt::Double),
        _ => None,
    }
}

/// Decodes a 32-bit instruction word fetched at `pc`.
///
/// Returns `None` for unknown or reserved encodings; the pipeline turns
/// that into an `InvalidInstruction` carrying the offending word and PC.
/// An all-zero word is `nop` regardless of other fields.
pub fn decode(word: u32, pc: u32) -> Option<Decoded> {
    if word == 0 {
        return Some(Decoded {
            name: "nop",
            op: Op::Nop,
        });
    }

    let i = Instruction(word);
    match i.op() {
        OP_SPECIAL => decode_special(i, pc),
        OP_REGIMM => decode_regimm(i, pc),
        0x02 => Some(Decoded {
            name: "j",
            op: Op::Jump {
                target: jump_target(word, pc),
            },
        }),
        0x03 => Some(Decoded {
            name: "jal",
            op: Op::JumpAndLink {
                target: jump_target(word, pc),
                link: pc.wrapping_add(8),
            },
        }),
        0x04 => Some(Decoded {
            name: "beq",
            op: Op::Branch {
                cond: BranchCond::Eq,
                rs: i.rs(),
                rt: i.rt(),
                target: branch_target(pc, i.simm16()),
            },
        }),
        0x05 => Some(Decoded {
            name: "bne",
            op: Op::Branch {
                cond: BranchCond::Ne,
                rs: i.rs(),
                rt: i.rt(),
                target: branch_target(pc, i.simm16()),
            },
        }),
        0x06 => Some(Decoded {
            name: "blez",
            op: Op::Branch {
                cond: BranchCond::Lez,
                rs: i.rs(),
                rt: 0,
                target: branch_target(pc, i.simm16()),
            },
        }),
        0x07 => Some(Decoded {
            name: "bgtz",
            op: Op::Branch {
                cond: BranchCond::Gtz,
                rs: i.rs(),
                rt: 0,
                target: branch_target(pc, i.simm16()),
            },
        }),
        0x08 => Some(imm_alu("addi", ImmAluKind::Addi, i)),
        0x09 => Some(imm_alu("addiu", ImmAluKind::Addiu, i)),
        0x0A => Some(imm_alu("slti", ImmAluKind::Slti, i)),
        0x0B => Some(imm_alu("sltiu", ImmAluKind::Sltiu, i)),
        0x0C => Some(imm_logical("andi", ImmAluKind::Andi, i)),
        0x0D => Some(imm_logical("ori", ImmAluKind::Ori, i)),
        0x0E => Some(imm_logical("xori", ImmAluKind::Xori, i)),
        0x0F => Some(Decoded {
            name: "lui",
            op: Op::Lui {
                rt: i.rt(),
                imm: i.uimm16() << 16,
            },
        }),
        OP_COP0 => decode_cop0(i),
        OP_COP1 => decode_cop1(i, pc),
        OP_SPECIAL2 => decode_special2(i),
        OP_SPECIAL3 => decode_special3(i),
        0x20 => Some(load("lb", LoadKind::Lb, i)),
        0x21 => Some(load("lh", LoadKind::Lh, i)),
        0x22 => Some(load("lwl", LoadKind::Lwl, i)),
        0x23 => Some(load("lw", LoadKind::Lw, i)),
        0x24 => Some(load("lbu", LoadKind::Lbu, i)),
        0x25 => Some(load("lhu", LoadKind::Lhu, i)),
        0x26 => Some(load("lwr", LoadKind::Lwr, i)),
        0x28 => Some(store("sb", StoreKind::Sb, i)),
        0x29 => Some(store("sh", StoreKind::Sh, i)),
        0x2A => Some(store("swl", StoreKind::Swl, i)),
        0x2B => Some(store("sw", StoreKind::Sw, i)),
        0x2E => Some(store("swr", StoreKind::Swr, i)),
        0x30 => Some(load("ll", LoadKind::Ll, i)),
        0x31 => Some(Decoded {
            name: "lwc1",
            op: Op::LoadC1 {
                double: false,
                ft: i.ft(),
                base: i.rs(),
                offset: i.simm16(),
            },
        }),
        0x35 => Some(Decoded {
            name: "ldc1",
            op: Op::LoadC1 {
                double: true,
                ft: i.ft(),
                base: i.rs(),
                offset: i.simm16(),
            },
        }),
        0x38 => Some(store("sc", StoreKind::Sc, i)),
        0x39 => Some(Decoded {
            name: "swc1",
            op: Op::StoreC1 {
                double: false,
                ft: i.ft(),
                base: i.rs(),
                offset: i.simm16(),
            },
        }),
        0x3D => Some(Decoded {
            name: "sdc1",
            op: Op::StoreC1 {
                double: true,
                ft: i.ft(),
                base: i.rs(),
                offset: i.simm16(),
            },
        }),
        _ => None,
    }
}

fn jump_target(word: u32, pc: u32) -> u32 {
    (pc.wrapping_add(4) & 0xF000_0000) | ((word & 0x03FF_FFFF) << 2)
}

fn imm_alu(name: &'static str, kind: ImmAluKind, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::AluImm {
            kind,
            rt: i.rt(),
            rs: i.rs(),
            imm: i.simm16(),
        },
    }
}

fn imm_logical(name: &'static str, kind: ImmAluKind, i: Instruction) -> Decoded {
    // andi/ori/xori zero-extend their immediate.
    Decoded {
        name,
        op: Op::AluImm {
            kind,
            rt: i.rt(),
            rs: i.rs(),
            imm: i.uimm16() as i32,
        },
    }
}

fn load(name: &'static str, kind: LoadKind, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::Load {
            kind,
            rt: i.rt(),
            base: i.rs(),
            offset: i.simm16(),
        },
    }
}

fn store(name: &'static str, kind: StoreKind, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::Store {
            kind,
            rt: i.rt(),
            base: i.rs(),
            offset: i.simm16(),
        },
    }
}

fn alu(name: &'static str, kind: AluKind, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::Alu {
            kind,
            rd: i.rd(),
            rs: i.rs(),
            rt: i.rt(),
        },
    }
}

fn trap_reg(name: &'static str, cond: TrapCond, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::TrapReg {
            cond,
            rs: i.rs(),
            rt: i.rt(),
            name,
        },
    }
}

fn trap_imm(name: &'static str, cond: TrapCond, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::TrapImm {
            cond,
            rs: i.rs(),
            imm: i.simm16(),
            name,
        },
    }
}

fn decode_special(i: Instruction, pc: u32) -> Option<Decoded> {
    let d = match i.funct() {
        0x00 => Decoded {
            name: "sll",
            op: Op::Shift {
                kind: ShiftKind::Sll,
                rd: i.rd(),
                rt: i.rt(),
                shamt: i.shamt(),
            },
        },
        0x02 => {
            let (name, kind) = if i.rs() == 1 {
                ("rotr", ShiftKind::Rotr)
            } else {
                ("srl", ShiftKind::Srl)
            };
            Decoded {
                name,
                op: Op::Shift {
                    kind,
                    rd: i.rd(),
                    rt: i.rt(),
                    shamt: i.shamt(),
                },
            }
        }
        0x03 => Decoded {
            name: "sra",
            op: Op::Shift {
                kind: ShiftKind::Sra,
                rd: i.rd(),
                rt: i.rt(),
                shamt: i.shamt(),
            },
        },
        0x04 => shift_var("sllv", ShiftKind::Sll, i),
        0x06 => {
            if i.shamt() == 1 {
                shift_var("rotrv", ShiftKind::Rotr, i)
            } else {
                shift_var("srlv", ShiftKind::Srl, i)
            }
        }
        0x07 => shift_var("srav", ShiftKind::Sra, i),
        0x08 => Decoded {
            name: "jr",
            op: Op::JumpReg { rs: i.rs() },
        },
        0x09 => Decoded {
            name: "jalr",
            op: Op::JumpAndLinkReg {
                rd: if i.rd() == 0 { 31 } else { i.rd() },
                rs: i.rs(),
                link: pc.wrapping_add(8),
            },
        },
        0x01 => {
            // movci: condition code in rt bits 20:18, sense in bit 16.
            if (i.0 >> 17) & 1 != 0 {
                return None;
            }
            let on_true = i.tf();
            Decoded {
                name: if on_true { "movt" } else { "movf" },
                op: Op::CondMoveFlag {
                    rd: i.rd(),
                    rs: i.rs(),
                    cc: i.cc_rt(),
                    on_true,
                },
            }
        }
        0x0A => Decoded {
            name: "movz",
            op: Op::CondMove {
                rd: i.rd(),
                rs: i.rs(),
                rt: i.rt(),
                on_zero: true,
            },
        },
        0x0B => Decoded {
            name: "movn",
            op: Op::CondMove {
                rd: i.rd(),
                rs: i.rs(),
                rt: i.rt(),
                on_zero: false,
            },
        },
        0x0C => Decoded {
            name: "syscall",
            op: Op::Syscall,
        },
        0x0D => Decoded {
            name: "break",
            op: Op::Break,
        },
        0x10 => Decoded {
            name: "mfhi",
            op: Op::MoveFromHi { rd: i.rd() },
        },
        0x11 => Decoded {
            name: "mthi",
            op: Op::MoveToHi { rs: i.rs() },
        },
        0x12 => Decoded {
            name: "mflo",
            op: Op::MoveFromLo { rd: i.rd() },
        },
        0x13 => Decoded {
            name: "mtlo",
            op: Op::MoveToLo { rs: i.rs() },
        },
        0x18 => muldiv("mult", MulDivKind::Mult, i),
        0x19 => muldiv("multu", MulDivKind::Multu, i),
        0x1A => muldiv("div", MulDivKind::Div, i),
        0x1B => muldiv("divu", MulDivKind::Divu, i),
        0x20 => alu("add", AluKind::Add, i),
        0x21 => alu("addu", AluKind::Addu, i),
        0x22 => alu("sub", AluKind::Sub, i),
        0x23 => alu("subu", AluKind::Subu, i),
        0x24 => alu("and", AluKind::And, i),
        0x25 => alu("or", AluKind::Or, i),
        0x26 => alu("xor", AluKind::Xor, i),
        0x27 => alu("nor", AluKind::Nor, i),
        0x2A => alu("slt", AluKind::Slt, i),
        0x2B => alu("sltu", AluKind::Sltu, i),
        0x30 => trap_reg("tge", TrapCond::Ge, i),
        0x31 => trap_reg("tgeu", TrapCond::Geu, i),
        0x32 => trap_reg("tlt", TrapCond::Lt, i),
        0x33 => trap_reg("tltu", TrapCond::Ltu, i),
        0x34 => trap_reg("teq", TrapCond::Eq, i),
        0x36 => trap_reg("tne", TrapCond::Ne, i),
        _ => return None,
    };
    Some(d)
}

fn shift_var(name: &'static str, kind: ShiftKind, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::ShiftVar {
            kind,
            rd: i.rd(),
            rt: i.rt(),
            rs: i.rs(),
        },
    }
}

fn muldiv(name: &'static str, kind: MulDivKind, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::MulDiv {
            kind,
            rs: i.rs(),
            rt: i.rt(),
        },
    }
}

fn decode_regimm(i: Instruction, pc: u32) -> Option<Decoded> {
    let target = branch_target(pc, i.simm16());
    let d = match i.rt() {
        0x00 => Decoded {
            name: "bltz",
            op: Op::Branch {
                cond: BranchCond::Ltz,
                rs: i.rs(),
                rt: 0,
                target,
            },
        },
        0x01 => Decoded {
            name: "bgez",
            op: Op::Branch {
                cond: BranchCond::Gez,
                rs: i.rs(),
                rt: 0,
                target,
            },
        },
        0x10 => Decoded {
            name: "bltzal",
            op: Op::BranchAndLink {
                cond: BranchCond::Ltz,
                rs: i.rs(),
                target,
                link: pc.wrapping_add(8),
            },
        },
        0x11 => Decoded {
            name: "bgezal",
            op: Op::BranchAndLink {
                cond: BranchCond::Gez,
                rs: i.rs(),
                target,
                link: pc.wrapping_add(8),
            },
        },
        0x08 => trap_imm("tgei", TrapCond::Ge, i),
        0x09 => trap_imm("tgeiu", TrapCond::Geu, i),
        0x0A => trap_imm("tlti", TrapCond::Lt, i),
        0x0B => trap_imm("tltiu", TrapCond::Ltu, i),
        0x0C => trap_imm("teqi", TrapCond::Eq, i),
        0x0E => trap_imm("tnei", TrapCond::Ne, i),
        _ => return None,
    };
    Some(d)
}

fn decode_cop0(i: Instruction) -> Option<Decoded> {
    match i.rs() {
        0x00 => Some(Decoded {
            name: "mfc0",
            op: Op::MoveFromCop0 {
                rt: i.rt(),
                rd: i.rd(),
            },
        }),
        0x04 => Some(Decoded {
            name: "mtc0",
            op: Op::MoveToCop0 {
                rt: i.rt(),
                rd: i.rd(),
            },
        }),
        0x10 if i.funct() == 0x18 => Some(Decoded {
            name: "eret",
            op: Op::Eret,
        }),
        _ => None,
    }
}

fn decode_cop1(i: Instruction, pc: u32) -> Option<Decoded> {
    match i.fmt() {
        0x00 => Some(Decoded {
            name: "mfc1",
            op: Op::MoveFromCop1 {
                rt: i.rt(),
                fs: i.fs(),
            },
        }),
        0x04 => Some(Decoded {
            name: "mtc1",
            op: Op::MoveToCop1 {
                rt: i.rt(),
                fs: i.fs(),
            },
        }),
        0x08 => {
            let on_true = i.tf();
            Some(Decoded {
                name: if on_true { "bc1t" } else { "bc1f" },
                op: Op::BranchCop1 {
                    cc: i.cc_rt(),
                    on_true,
                    target: branch_target(pc, i.simm16()),
                },
            })
        }
        FMT_WORD => match i.funct() {
            0x20 => Some(Decoded {
                name: "cvt.s.w",
                op: Op::FpCvtSingle {
                    from: CvtSrc::Word,
                    fd: i.fd(),
                    fs: i.fs(),
                },
            }),
            0x21 => Some(Decoded {
                name: "cvt.d.w",
                op: Op::FpCvtDouble {
                    from: CvtSrc::Word,
                    fd: i.fd(),
                    fs: i.fs(),
                },
            }),
            _ => None,
        },
        fmt_bits => {
            let fmt = fp_fmt(fmt_bits)?;
            decode_cop1_fmt(i, fmt)
        }
    }
}

fn decode_cop1_fmt(i: Instruction, fmt: FpFmt) -> Option<Decoded> {
    let single = fmt == FpFmt::Single;
    let pick = |s: &'static str, d: &'static str| if single { s } else { d };
    let d = match i.funct() {
        0x00 => fp_arith(pick("add.s", "add.d"), FpArithKind::Add, fmt, i),
        0x01 => fp_arith(pick("sub.s", "sub.d"), FpArithKind::Sub, fmt, i),
        0x02 => fp_arith(pick("mul.s", "mul.d"), FpArithKind::Mul, fmt, i),
        0x03 => fp_arith(pick("div.s", "div.d"), FpArithKind::Div, fmt, i),
        0x04 => fp_unary(pick("sqrt.s", "sqrt.d"), FpUnaryKind::Sqrt, fmt, i),
        0x05 => fp_unary(pick("abs.s", "abs.d"), FpUnaryKind::Abs, fmt, i),
        0x06 => fp_unary(pick("mov.s", "mov.d"), FpUnaryKind::Mov, fmt, i),
        0x07 => fp_unary(pick("neg.s", "neg.d"), FpUnaryKind::Neg, fmt, i),
        0x0C => fp_to_word(pick("round.w.s", "round.w.d"), RoundMode::Nearest, fmt, i),
        0x0D => fp_to_word(pick("trunc.w.s", "trunc.w.d"), RoundMode::Trunc, fmt, i),
        0x0E => fp_to_word(pick("ceil.w.s", "ceil.w.d"), RoundMode::Ceil, fmt, i),
        0x0F => fp_to_word(pick("floor.w.s", "floor.w.d"), RoundMode::Floor, fmt, i),
        0x11 => {
            if (i.0 >> 17) & 1 != 0 {
                return None;
            }
            let on_true = i.tf();
            Decoded {
                name: if on_true {
                    pick("movt.s", "movt.d")
                } else {
                    pick("movf.s", "movf.d")
                },
                op: Op::FpCondMoveFlag {
                    fmt,
                    fd: i.fd(),
                    fs: i.fs(),
                    cc: i.cc_rt(),
                    on_true,
                },
            }
        }
        0x12 => Decoded {
            name: pick("movz.s", "movz.d"),
            op: Op::FpCondMove {
                fmt,
                fd: i.fd(),
                fs: i.fs(),
                rt: i.rt(),
                on_zero: true,
            },
        },
        0x13 => Decoded {
            name: pick("movn.s", "movn.d"),
            op: Op::FpCondMove {
                fmt,
                fd: i.fd(),
                fs: i.fs(),
                rt: i.rt(),
                on_zero: false,
            },
        },
        0x20 => {
            // cvt.s.s is a reserved encoding.
            if single {
                return None;
            }
            Decoded {
                name: "cvt.s.d",
                op: Op::FpCvtSingle {
                    from: CvtSrc::Double,
                    fd: i.fd(),
                    fs: i.fs(),
                },
            }
        }
        0x21 => {
            if !single {
                return None;
            }
            Decoded {
                name: "cvt.d.s",
                op: Op::FpCvtDouble {
                    from: CvtSrc::Single,
                    fd: i.fd(),
                    fs: i.fs(),
                },
            }
        }
        0x24 => fp_to_word(pick("cvt.w.s", "cvt.w.d"), RoundMode::Nearest, fmt, i),
        0x32 => fp_compare(pick("c.eq.s", "c.eq.d"), FpCond::Eq, fmt, i),
        0x3C => fp_compare(pick("c.lt.s", "c.lt.d"), FpCond::Lt, fmt, i),
        0x3E => fp_compare(pick("c.le.s", "c.le.d"), FpCond::Le, fmt, i),
        _ => return None,
    };
    Some(d)
}

fn fp_arith(name: &'static str, kind: FpArithKind, fmt: FpFmt, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::FpArith {
            kind,
            fmt,
            fd: i.fd(),
            fs: i.fs(),
            ft: i.ft(),
        },
    }
}

fn fp_unary(name: &'static str, kind: FpUnaryKind, fmt: FpFmt, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::FpUnary {
            kind,
            fmt,
            fd: i.fd(),
            fs: i.fs(),
        },
    }
}

fn fp_to_word(name: &'static str, mode: RoundMode, fmt: FpFmt, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::FpCvtWord {
            fmt,
            mode,
            fd: i.fd(),
            fs: i.fs(),
        },
    }
}

fn fp_compare(name: &'static str, cond: FpCond, fmt: FpFmt, i: Instruction) -> Decoded {
    Decoded {
        name,
        op: Op::FpCompare {
            cond,
            fmt,
            cc: i.cc_sa(),
            fs: i.fs(),
            ft: i.ft(),
        },
    }
}

fn decode_special2(i: Instruction) -> Option<Decoded> {
    let d = match i.funct() {
        0x00 => muldiv("madd", MulDivKind::Madd, i),
        0x01 => muldiv("maddu", MulDivKind::Maddu, i),
        0x02 => Decoded {
            name: "mul",
            op: Op::Mul {
                rd: i.rd(),
                rs: i.rs(),
                rt: i.rt(),
            },
        },
        0x04 => muldiv("msub", MulDivKind::Msub, i),
        0x05 => muldiv("msubu", MulDivKind::Msubu, i),
        0x20 => Decoded {
            name: "clz",
            op: Op::CountLeading {
                ones: false,
                rd: i.rd(),
                rs: i.rs(),
            },
        },
        0x21 => Decoded {
            name: "clo",
            op: Op::CountLeading {
                ones: true,
                rd: i.rd(),
                rs: i.rs(),
            },
        },
        _ => return None,
    };
    Some(d)
}

fn decode_special3(i: Instruction) -> Option<Decoded> {
    let d = match i.funct() {
        0x00 => Decoded {
            name: "ext",
            op: Op::Ext {
                rt: i.rt(),
                rs: i.rs(),
                pos: i.shamt(),
                size: i.rd() as u32 + 1,
            },
        },
        0x03 => Decoded {
            name: "dext",
            op: Op::DExt {
                rt: i.rt(),
                rs: i.rs(),
                pos: i.shamt(),
                size: i.rd() as u32 + 1,
            },
        },
        0x04 => {
            let msb = i.rd() as u32;
            let lsb = i.shamt();
            if msb < lsb {
                return None;
            }
            Decoded {
                name: "ins",
                op: Op::Ins {
                    rt: i.rt(),
                    rs: i.rs(),
                    pos: lsb,
                    size: msb - lsb + 1,
                },
            }
        }
        0x07 => {
            let msb = i.rd() as u32;
            let lsb = i.shamt();
            if msb < lsb {
                return None;
            }
            Decoded {
                name: "dins",
                op: Op::DIns {
                    rt: i.rt(),
                    rs: i.rs(),
                    pos: lsb,
                    size: msb - lsb + 1,
                },
            }
        }
        0x20 => match i.shamt() {
            0x02 => Decoded {
                name: "wsbh",
                op: Op::Wsbh {
                    rd: i.rd(),
                    rt: i.rt(),
                },
            },
            0x10 => Decoded {
                name: "seb",
                op: Op::SignExtend {
                    halfword: false,
                    rd: i.rd(),
                    rt: i.rt(),
                },
            },
            0x18 => Decoded {
                name: "seh",
                op: Op::SignExtend {
                    halfword: true,
                    rd: i.rd(),
                    rt: i.rt(),
                },
            },
            _ => return None,
        },
        _ => return None,
    };
    Some(d)
}
