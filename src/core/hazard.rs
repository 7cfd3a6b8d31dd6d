//! Hazard classification and detection.
//!
//! Each instruction is summarized as its source registers, its
//! destination, and whether it loads, stores, or redirects control.
//! HI and LO participate in dependence tracking through synthetic
//! register indices beyond the GPR range. Detection covers load-use
//! and structural hazards under forwarding, and plain RAW stalls when
//! forwarding is disabled.

use crate::isa::op::Op;

/// Synthetic register index for HI.
pub const REG_HI: usize = 33;
/// Synthetic register index for LO.
pub const REG_LO: usize = 34;

/// Dependence summary of one instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HazardInfo {
    pub sources: Vec<usize>,
    pub destination: Option<usize>,
    pub is_load: bool,
    pub is_store: bool,
    pub is_control: bool,
}

/// Stall decision for the instruction sitting in IF/ID.
#[derive(Clone, Copy, Debug, Default)]
pub struct HazardDecision {
    pub load_use: bool,
    pub structural: bool,
    pub raw_stall: bool,
}

impl HazardDecision {
    pub fn stall(&self) -> bool {
        self.load_use || self.structural || self.raw_stall
    }
}

/// Classifies a decoded operation into its dependence summary.
pub fn classify(op: &Op) -> HazardInfo {
    let mut info = HazardInfo::default();
    match *op {
        Op::Nop | Op::Syscall | Op::Break | Op::Eret => {
            info.is_control = matches!(op, Op::Eret);
        }

        Op::Alu { rd, rs, rt, .. } => {
            info.sources = vec![rs, rt];
            info.destination = Some(rd);
        }
        Op::AluImm { rt, rs, .. } => {
            info.sources = vec![rs];
            info.destination = Some(rt);
        }
        Op::Lui { rt, .. } => info.destination = Some(rt),
        Op::Shift { rd, rt, .. } => {
            info.sources = vec![rt];
            info.destination = Some(rd);
        }
        Op::ShiftVar { rd, rt, rs, .. } => {
            info.sources = vec![rs, rt];
            info.destination = Some(rd);
        }

        Op::MulDiv { rs, rt, .. } => {
            info.sources = vec![rs, rt];
        }
        Op::Mul { rd, rs, rt } => {
            info.sources = vec![rs, rt];
            info.destination = Some(rd);
        }
        Op::CountLeading { rd, rs, .. } => {
            info.sources = vec![rs];
            info.destination = Some(rd);
        }
        Op::MoveFromHi { rd } => {
            info.sources = vec![REG_HI];
            info.destination = Some(rd);
        }
        Op::MoveToHi { rs } => {
            info.sources = vec![rs];
            info.destination = Some(REG_HI);
        }
        Op::MoveFromLo { rd } => {
            info.sources = vec![REG_LO];
            info.destination = Some(rd);
        }
        Op::MoveToLo { rs } => {
            info.sources = vec![rs];
            info.destination = Some(REG_LO);
        }

        Op::CondMove { rd, rs, rt, .. } => {
            info.sources = vec![rs, rt];
            info.destination = Some(rd);
        }
        Op::CondMoveFlag { rd, rs, .. } => {
            info.sources = vec![rs];
            info.destination = Some(rd);
        }

        Op::Jump { .. } => info.is_control = true,
        Op::JumpAndLink { .. } => {
            info.is_control = true;
            info.destination = Some(31);
        }
        Op::JumpReg { rs } => {
            info.is_control = true;
            info.sources = vec![rs];
        }
        Op::JumpAndLinkReg { rd, rs, .. } => {
            info.is_control = true;
            info.sources = vec![rs];
            info.destination = Some(rd);
        }
        Op::Branch { rs, rt, .. } => {
            info.is_control = true;
            info.sources = vec![rs, rt];
        }
        Op::BranchAndLink { rs, .. } => {
            info.is_control = true;
            info.sources = vec![rs];
            info.destination = Some(31);
        }
        Op::BranchCop1 { .. } => info.is_control = true,

        Op::TrapReg { rs, rt, .. } => info.sources = vec![rs, rt],
        Op::TrapImm { rs, .. } => info.sources = vec![rs],

        Op::Load { rt, base, .. } => {
            info.sources = vec![base];
            info.destination = Some(rt);
            info.is_load = true;
        }
        Op::Store { rt, base, .. } => {
            info.sources = vec![base, rt];
            info.is_store = true;
        }
        Op::LoadC1 { base, .. } => {
            info.sources = vec![base];
            info.is_load = true;
        }
        Op::StoreC1 { base, .. } => {
            info.sources = vec![base];
            info.is_store = true;
        }

        Op::Ext { rt, rs, .. } | Op::DExt { rt, rs, .. } => {
            info.sources = vec![rs];
            info.destination = Some(rt);
        }
        Op::Ins { rt, rs, .. } | Op::DIns { rt, rs, .. } => {
            info.sources = vec![rs, rt];
            info.destination = Some(rt);
        }
        Op::Wsbh { rd, rt } | Op::SignExtend { rd, rt, .. } => {
            info.sources = vec![rt];
            info.destination = Some(rd);
        }

        Op::MoveFromCop0 { rt, .. } => info.destination = Some(rt),
        Op::MoveToCop0 { rt, .. } => info.sources = vec![rt],
        Op::MoveFromCop1 { rt, .. } => info.destination = Some(rt),
        Op::MoveToCop1 { rt, .. } => info.sources = vec![rt],

        Op::FpArith { .. }
        | Op::FpUnary { .. }
        | Op::FpCompare { .. }
        | Op::FpCvtSingle { .. }
        | Op::FpCvtDouble { .. }
        | Op::FpCvtWord { .. }
        | Op::FpCondMoveFlag { .. } => {}
        Op::FpCondMove { rt, .. } => info.sources = vec![rt],
    }
    info
}

/// Decides whether the decoding instruction has to stall.
///
/// With forwarding, only a load in EX whose destination feeds the
/// decoding instruction forces a stall, plus the structural hazard on
/// the shared memory port when the MEM stage holds a load or store.
/// Without forwarding, any RAW dependence against either stage stalls.
pub fn detect(
    decoding: &HazardInfo,
    executing: Option<&HazardInfo>,
    memory_stage: Option<&HazardInfo>,
    forwarding_enabled: bool,
) -> HazardDecision {
    let mut decision = HazardDecision::default();

    if forwarding_enabled {
        if let Some(ex) = executing {
            if ex.is_load {
                if let Some(dest) = ex.destination {
                    if dest != 0 && decoding.sources.contains(&dest) {
                        decision.load_use = true;
                    }
                }
            }
        }
        if let Some(mem) = memory_stage {
            decision.structural = mem.is_load || mem.is_store;
        }
    } else {
        for stage in [executing, memory_stage].into_iter().flatten() {
            if let Some(dest) = stage.destination {
                if dest != 0 && decoding.sources.contains(&dest) {
                    decision.raw_stall = true;
                }
            }
        }
    }

    decision
}
