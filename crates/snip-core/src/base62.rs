/// Symbols used by the base62 rendering, indexed by digit value.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const BASE: u64 = ALPHABET.len() as u64;

/// Renders `num` in base62, least-significant digit first.
///
/// Repeated division stops once the quotient reaches zero, so there are no
/// padding digits and `0` renders as the empty string.
///
/// # Examples
///
/// ```
/// use snip_core::base62::encode_reversed;
///
/// assert_eq!(encode_reversed(1243), "3K");
/// assert_eq!(encode_reversed(0), "");
/// ```
pub fn encode_reversed(mut num: u64) -> String {
    // u64::MAX needs 11 base62 digits.
    let mut out = String::with_capacity(11);
    while num > 0 {
        out.push(ALPHABET[(num % BASE) as usize] as char);
        num /= BASE;
    }
    out
}

/// Returns `true` if every byte of `s` is a base62 symbol.
pub fn is_base62(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_alphanumeric())
}
