//! Integration tests for the executor semantics.

mod util;

use mips32_sim::common::CpuException;
use mips32_sim::core::state::{BranchState, MachineState};
use mips32_sim::isa::{decode, execute};
use mips32_sim::mem::Memory;
use util::*;

fn fresh() -> (MachineState, Memory) {
    (MachineState::new(TEXT_BASE), default_memory())
}

fn run_op(word: u32, pc: u32, state: &mut MachineState, mem: &mut Memory) {
    let d = decode(word, pc).expect("valid encoding");
    execute(&d.op, pc, state, mem).expect("execution fault");
}

fn try_op(
    word: u32,
    pc: u32,
    state: &mut MachineState,
    mem: &mut Memory,
) -> Result<(), CpuException> {
    let d = decode(word, pc).expect("valid encoding");
    execute(&d.op, pc, state, mem).map(|_| ())
}

/// Tests the signed-overflow predicate of checked add: overflow iff
/// (a ^ s) & (b ^ s) is negative.
#[test]
fn test_checked_add_overflow_predicate() {
    let cases: [(i32, i32); 6] = [
        (i32::MAX, 1),
        (i32::MIN, -1),
        (100, 200),
        (-100, -200),
        (i32::MAX, i32::MIN),
        (0x4000_0000, 0x4000_0000),
    ];
    for (a, b) in cases {
        let (mut state, mut mem) = fresh();
        state.regs.write(8, a as u32);
        state.regs.write(9, b as u32);
        let result = try_op(add(10, 8, 9), TEXT_BASE, &mut state, &mut mem);

        let sum = a.wrapping_add(b);
        let overflows = ((a ^ sum) & (b ^ sum)) < 0;
        if overflows {
            assert!(
                matches!(result, Err(CpuException::ArithmeticOverflow { pc }) if pc == TEXT_BASE),
                "expected overflow for {} + {}",
                a,
                b
            );
            assert_eq!(state.regs.read(10), 0, "destination untouched on fault");
        } else {
            result.unwrap();
            assert_eq!(state.regs.read(10), sum as u32);
        }
    }
}

/// Tests that addu wraps silently where add faults.
#[test]
fn test_addu_wraps() {
    let (mut state, mut mem) = fresh();
    state.regs.write(8, i32::MAX as u32);
    state.regs.write(9, 1);
    run_op(addu(10, 8, 9), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 0x8000_0000);
}

/// Tests slt/sltu signedness.
#[test]
fn test_set_less_than() {
    let (mut state, mut mem) = fresh();
    state.regs.write(8, (-1i32) as u32);
    state.regs.write(9, 1);

    run_op(r_type(0, 8, 9, 10, 0, 0x2A), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 1, "-1 < 1 signed");

    run_op(r_type(0, 8, 9, 10, 0, 0x2B), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 0, "0xFFFFFFFF > 1 unsigned");
}

/// Tests variable shifts masking the shift amount to five bits.
#[test]
fn test_variable_shift_masks_amount() {
    let (mut state, mut mem) = fresh();
    state.regs.write(8, 33);
    state.regs.write(9, 0b110);
    let sllv = r_type(0, 8, 9, 10, 0, 0x04);
    run_op(sllv, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 0b1100, "shift by 33 & 0x1F = 1");
}

/// Tests the rotate-right round trip: ror(ror(x, k), 32 - k) == x.
#[test]
fn test_rotr_round_trip() {
    for k in 1..32u32 {
        let (mut state, mut mem) = fresh();
        let x = 0x1234_5678u32;
        state.regs.write(9, x);
        run_op(r_type(0, 1, 9, 10, k, 0x02), TEXT_BASE, &mut state, &mut mem);
        run_op(
            r_type(0, 1, 10, 11, 32 - k, 0x02),
            TEXT_BASE,
            &mut state,
            &mut mem,
        );
        assert_eq!(state.regs.read(11), x, "ror round trip failed for k={}", k);
    }
}

/// Tests wsbh applied twice is the identity.
#[test]
fn test_wsbh_involution() {
    for x in [0u32, 0x1234_5678, 0xFFFF_0001, 0xA5A5_5A5A] {
        let (mut state, mut mem) = fresh();
        state.regs.write(9, x);
        let wsbh_rd10 = r_type(0x1F, 0, 9, 10, 0x02, 0x20);
        run_op(wsbh_rd10, TEXT_BASE, &mut state, &mut mem);
        let wsbh_rd11 = r_type(0x1F, 0, 10, 11, 0x02, 0x20);
        run_op(wsbh_rd11, TEXT_BASE, &mut state, &mut mem);
        assert_eq!(state.regs.read(11), x);
        assert_eq!(
            state.regs.read(10),
            ((x & 0x00FF_00FF) << 8) | ((x >> 8) & 0x00FF_00FF)
        );
    }
}

/// Tests seb/seh against the masking property.
#[test]
fn test_sign_extend_masks() {
    for x in [0x0000_007Fu32, 0x0000_0080, 0x0000_8000, 0xFFFF_7FFF] {
        let (mut state, mut mem) = fresh();
        state.regs.write(9, x);
        let seb = r_type(0x1F, 0, 9, 10, 0x10, 0x20);
        run_op(seb, TEXT_BASE, &mut state, &mut mem);
        assert_eq!(state.regs.read(10) & 0xFF, x & 0xFF);

        let seh = r_type(0x1F, 0, 9, 11, 0x18, 0x20);
        run_op(seh, TEXT_BASE, &mut state, &mut mem);
        assert_eq!(state.regs.read(11) & 0xFFFF, x & 0xFFFF);
        assert_eq!(state.regs.read(11), x as u16 as i16 as i32 as u32);
    }
}

/// Tests clz/clo counting.
#[test]
fn test_count_leading() {
    let (mut state, mut mem) = fresh();
    state.regs.write(9, 0x0000_FFFF);
    run_op(r_type(0x1C, 9, 0, 10, 0, 0x20), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 16);

    state.regs.write(9, 0xFFFF_0000);
    run_op(r_type(0x1C, 9, 0, 10, 0, 0x21), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 16);

    state.regs.write(9, 0);
    run_op(r_type(0x1C, 9, 0, 10, 0, 0x20), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 32);
}

/// Tests mult/div HI:LO results, including the literal div scenario:
/// -7 / 2 gives HI = -1, LO = -3.
#[test]
fn test_mult_div() {
    let (mut state, mut mem) = fresh();
    state.regs.write(8, (-6i32) as u32);
    state.regs.write(9, 7);
    run_op(mult(8, 9), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.lo, (-42i32) as u32);
    assert_eq!(state.hi, 0xFFFF_FFFF);

    state.regs.write(8, (-7i32) as u32);
    state.regs.write(9, 2);
    run_op(div(8, 9), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.lo, (-3i32) as u32);
    assert_eq!(state.hi, (-1i32) as u32);
}

/// Tests that division by zero leaves HI/LO unchanged.
#[test]
fn test_div_by_zero_no_op() {
    let (mut state, mut mem) = fresh();
    state.hi = 0x1111;
    state.lo = 0x2222;
    state.regs.write(8, 10);
    state.regs.write(9, 0);
    run_op(div(8, 9), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.hi, 0x1111);
    assert_eq!(state.lo, 0x2222);

    let divu = r_type(0, 8, 9, 0, 0, 0x1B);
    run_op(divu, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.hi, 0x1111);
    assert_eq!(state.lo, 0x2222);
}

/// Tests madd/msub 64-bit accumulation into HI:LO.
#[test]
fn test_madd_msub_accumulate() {
    let (mut state, mut mem) = fresh();
    state.regs.write(8, 3);
    state.regs.write(9, 4);
    run_op(mult(8, 9), TEXT_BASE, &mut state, &mut mem);

    let madd = r_type(0x1C, 8, 9, 0, 0, 0x00);
    run_op(madd, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.lo, 24);
    assert_eq!(state.hi, 0);

    let msub = r_type(0x1C, 8, 9, 0, 0, 0x04);
    run_op(msub, TEXT_BASE, &mut state, &mut mem);
    run_op(msub, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.lo, 0);
    assert_eq!(state.hi, 0);
}

/// Tests SPECIAL2 mul leaving HI/LO untouched.
#[test]
fn test_special2_mul_preserves_hi_lo() {
    let (mut state, mut mem) = fresh();
    state.hi = 0xAAAA;
    state.lo = 0xBBBB;
    state.regs.write(9, 6);
    state.regs.write(10, 7);
    run_op(0x712A_4002, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 42);
    assert_eq!(state.hi, 0xAAAA);
    assert_eq!(state.lo, 0xBBBB);
}

/// Tests movz/movn conditional moves.
#[test]
fn test_conditional_moves() {
    let (mut state, mut mem) = fresh();
    state.regs.write(8, 0xDEAD);
    state.regs.write(9, 0);
    state.regs.write(10, 0x1111);

    let movz = r_type(0, 8, 9, 10, 0, 0x0A);
    run_op(movz, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 0xDEAD, "movz fires on zero rt");

    state.regs.write(10, 0x1111);
    let movn = r_type(0, 8, 9, 10, 0, 0x0B);
    run_op(movn, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 0x1111, "movn holds on zero rt");
}

/// Tests trap instructions firing exactly on their condition.
#[test]
fn test_traps() {
    let (mut state, mut mem) = fresh();
    state.regs.write(8, 5);
    state.regs.write(9, 5);

    let teq = r_type(0, 8, 9, 0, 0, 0x34);
    let err = try_op(teq, TEXT_BASE, &mut state, &mut mem).unwrap_err();
    assert!(matches!(err, CpuException::Trap { name: "teq", .. }));

    let tne = r_type(0, 8, 9, 0, 0, 0x36);
    try_op(tne, TEXT_BASE, &mut state, &mut mem).unwrap();

    let tgei = i_type(0x01, 8, 0x08, 4);
    let err = try_op(tgei, TEXT_BASE, &mut state, &mut mem).unwrap_err();
    assert!(matches!(err, CpuException::Trap { name: "tgei", .. }));
}

/// Tests ext/ins bitfield operations.
#[test]
fn test_ext_ins() {
    let (mut state, mut mem) = fresh();
    state.regs.write(9, 0x0000_0AB0);
    // ext r8, r9, pos=4, size=8
    run_op(r_type(0x1F, 9, 8, 7, 4, 0x00), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 0xAB);

    state.regs.write(9, 0xCD);
    state.regs.write(8, 0xFFFF_FFFF);
    // ins r8, r9, pos=8, size=8 (msb = 15)
    run_op(r_type(0x1F, 9, 8, 15, 8, 0x04), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 0xFFFF_CDFF);
}

/// Tests the dext/dins range guard.
#[test]
fn test_dext_range_check() {
    let (mut state, mut mem) = fresh();
    state.regs.write(9, 0xFF);
    // dext pos=4, size=8 is fine on the zero-extended value.
    run_op(r_type(0x1F, 9, 8, 7, 4, 0x03), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 0xF);
}

/// Tests jal/jr linkage through the delayed-branch machine.
#[test]
fn test_jal_jr_linkage() {
    let (mut state, mut mem) = fresh();
    let pc = TEXT_BASE;
    run_op(jal(0x0010_0040), pc, &mut state, &mut mem);
    assert_eq!(state.regs.read(31), pc + 8);
    assert_eq!(state.branch.state(), BranchState::Registered);
    assert_eq!(state.branch.target(), Some(0x0040_0100));

    state.branch.clear();
    state.regs.write(8, 0x0040_0200);
    run_op(jr(8), pc, &mut state, &mut mem);
    assert_eq!(state.branch.target(), Some(0x0040_0200));
}

/// Tests bltzal writing the link register only when taken.
#[test]
fn test_branch_and_link_only_when_taken() {
    let (mut state, mut mem) = fresh();
    state.regs.write(8, 5);
    let bltzal = i_type(0x01, 8, 0x10, 4);
    run_op(bltzal, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(31), 0, "link untouched on a not-taken branch");
    assert_eq!(state.branch.state(), BranchState::Cleared);

    state.regs.write(8, (-5i32) as u32);
    run_op(bltzal, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(31), TEXT_BASE + 8);
    assert_eq!(state.branch.state(), BranchState::Registered);
}

/// Tests the LL/SC protocol: a clean pair succeeds, an overlapping
/// store poisons the reservation.
#[test]
fn test_ll_sc_protocol() {
    let (mut state, mut mem) = fresh();
    mem.poke_word(DATA_BASE, 0x5555_5555);
    state.regs.write(20, DATA_BASE);

    run_op(ll(8, 0, 20), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 0x5555_5555);
    assert_eq!(state.reservation, Some(DATA_BASE));

    state.regs.write(9, 0x7777_7777);
    run_op(sc(9, 0, 20), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(9), 1, "sc succeeds under a live reservation");
    assert_eq!(
        mem.read_word(DATA_BASE, mips32_sim::common::AccessType::Read)
            .unwrap(),
        0x7777_7777
    );
    assert_eq!(state.reservation, None);
}

/// Tests that any store overlapping the reserved word defeats sc.
#[test]
fn test_sc_fails_after_overlapping_store() {
    let (mut state, mut mem) = fresh();
    mem.poke_word(DATA_BASE, 0x5555_5555);
    state.regs.write(20, DATA_BASE);

    run_op(ll(8, 0, 20), TEXT_BASE, &mut state, &mut mem);
    // A byte store into the reserved word, from another "thread".
    state.regs.write(9, 0xAA);
    run_op(sb(9, 2, 20), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.reservation, None);

    state.regs.write(10, 0x7777_7777);
    run_op(sc(10, 0, 20), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(10), 0, "sc fails without a reservation");
    assert_ne!(
        mem.read_word(DATA_BASE, mips32_sim::common::AccessType::Read)
            .unwrap(),
        0x7777_7777,
        "sc must not store on failure"
    );
}

/// Tests that a store outside the reserved word keeps it live.
#[test]
fn test_sc_survives_disjoint_store() {
    let (mut state, mut mem) = fresh();
    state.regs.write(20, DATA_BASE);
    run_op(ll(8, 0, 20), TEXT_BASE, &mut state, &mut mem);

    state.regs.write(9, 1);
    run_op(sw(9, 8, 20), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.reservation, Some(DATA_BASE));

    run_op(sc(9, 0, 20), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(9), 1);
}

/// Tests the little-endian lwl/lwr pair assembling an unaligned word.
#[test]
fn test_lwl_lwr_unaligned_load() {
    let (mut state, mut mem) = fresh();
    mem.poke_word(DATA_BASE, 0x4433_2211);
    mem.poke_word(DATA_BASE + 4, 0x8877_6655);
    state.regs.write(20, DATA_BASE);

    // Load the word at DATA_BASE + 2: expect 0x66554433.
    let lwr = i_type(0x26, 20, 8, 2);
    let lwl = i_type(0x22, 20, 8, 5);
    run_op(lwr, TEXT_BASE, &mut state, &mut mem);
    run_op(lwl, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 0x6655_4433);
}

/// Tests the little-endian swl/swr pair storing an unaligned word.
#[test]
fn test_swl_swr_unaligned_store() {
    let (mut state, mut mem) = fresh();
    mem.poke_word(DATA_BASE, 0x4433_2211);
    mem.poke_word(DATA_BASE + 4, 0x8877_6655);
    state.regs.write(20, DATA_BASE);
    state.regs.write(8, 0xDDCC_BBAA);

    let swr = i_type(0x2E, 20, 8, 2);
    let swl = i_type(0x2A, 20, 8, 5);
    run_op(swr, TEXT_BASE, &mut state, &mut mem);
    run_op(swl, TEXT_BASE, &mut state, &mut mem);

    let read = mips32_sim::common::AccessType::Read;
    assert_eq!(mem.read_word(DATA_BASE, read).unwrap(), 0xBBAA_2211);
    assert_eq!(mem.read_word(DATA_BASE + 4, read).unwrap(), 0x8877_DDCC);
}

/// Tests byte and halfword loads with sign and zero extension.
#[test]
fn test_byte_halfword_extension() {
    let (mut state, mut mem) = fresh();
    mem.poke(DATA_BASE, 0x80);
    mem.poke(DATA_BASE + 1, 0xFF);
    state.regs.write(20, DATA_BASE);

    run_op(lb(8, 0, 20), TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 0xFFFF_FF80);

    let lbu = i_type(0x24, 20, 8, 0);
    run_op(lbu, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 0x80);

    let lh = i_type(0x21, 20, 8, 0);
    run_op(lh, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 0xFFFF_FF80);

    let lhu = i_type(0x25, 20, 8, 0);
    run_op(lhu, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.regs.read(8), 0xFF80);
}

/// Tests ldc1 register and alignment constraints.
#[test]
fn test_ldc1_constraints() {
    let (mut state, mut mem) = fresh();
    state.regs.write(20, DATA_BASE);

    // Odd target register.
    let odd = i_type(0x35, 20, 3, 0);
    let err = try_op(odd, TEXT_BASE, &mut state, &mut mem).unwrap_err();
    assert!(matches!(err, CpuException::Range { .. }));

    // Misaligned address.
    let misaligned = i_type(0x35, 20, 2, 4);
    let err = try_op(misaligned, TEXT_BASE, &mut state, &mut mem).unwrap_err();
    assert!(matches!(err, CpuException::AddressError { .. }));

    // Aligned, even register: low word lands in the even half.
    mem.poke_word(DATA_BASE, 0x1111_2222);
    mem.poke_word(DATA_BASE + 4, 0x3333_4444);
    let ok = i_type(0x35, 20, 2, 0);
    run_op(ok, TEXT_BASE, &mut state, &mut mem);
    assert_eq!(state.fpu.read_raw(2), 0x1111_2222);
    assert_eq!(state.fpu.read_raw(3), 0x3333_4444);
}

/// Tests eret clearing Status bit 1, redirecting to EPC, and dropping
/// a pending delayed branch.
#[test]
fn test_eret() {
    use mips32_sim::core::state::{COP0_EPC, COP0_STATUS, STATUS_EXL};

    let (mut state, mut mem) = fresh();
    state.cop0[COP0_STATUS] = STATUS_EXL | 0x10;
    state.cop0[COP0_EPC] = 0x0040_0080;
    state.branch.register(0x0040_0F00);
    mem.map.set_kernel_mode(true);

    let eret = (0x10 << 26) | (0x10 << 21) | 0x18;
    run_op(eret, 0x8000_0000, &mut state, &mut mem);

    assert_eq!(state.pc, 0x0040_0080);
    assert_eq!(state.cop0[COP0_STATUS], 0x10, "only bit 1 cleared");
    assert_eq!(state.branch.state(), BranchState::Cleared);
    assert!(!mem.map.kernel_mode());
}
