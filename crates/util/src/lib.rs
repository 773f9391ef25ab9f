/// Returns a `Box<[T; LEN]>` filled with `elem`.
pub fn boxed_array<T: Clone, const LEN: usize>(elem: T) -> Box<[T; LEN]> {
    let boxed = vec![elem; LEN].into_boxed_slice();
    match boxed.try_into() {
        Ok(array) => array,
        Err(_) => unreachable!("vec was built with exactly LEN elements"),
    }
}

/// Sign extends the lowest `bits` bits of `value` to a full `u32`.
#[inline(always)]
pub fn sign_extend(value: u32, bits: u32) -> u32 {
    debug_assert!(bits > 0 && bits <= 32);
    let shift = 32 - bits;
    (((value << shift) as i32) >> shift) as u32
}

/// Zero extends the lowest `bits` bits of `value` to a full `u32`.
#[inline(always)]
pub fn zero_extend(value: u32, bits: u32) -> u32 {
    debug_assert!(bits > 0 && bits <= 32);
    if bits == 32 {
        value
    } else {
        value & ((1 << bits) - 1)
    }
}
