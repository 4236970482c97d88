// via https://fgiesen.wordpress.com/2009/12/13/decoding-morton-codes/

// "Insert" a 0 bit after each of the 16 low bits of x
// Example: input 0b1011_1100_1011_1101, output 0b01000101_01010000_01000101_01010001
pub(super) fn part_1by1(mut x: u32) -> u32 {
    x &= 0x0000_ffff; // x = ---- ---- ---- ---- fedc ba98 7654 3210
    x = (x ^ (x << 8)) & 0x00ff_00ff; // x = ---- ---- fedc ba98 ---- ---- 7654 3210
    x = (x ^ (x << 4)) & 0x0f0f_0f0f; // x = ---- fedc ---- ba98 ---- 7654 ---- 3210
    x = (x ^ (x << 2)) & 0x3333_3333; // x = --fe --dc --ba --98 --76 --54 --32 --10
    x = (x ^ (x << 1)) & 0x5555_5555; // x = -f-e -d-c -b-a -9-8 -7-6 -5-4 -3-2 -1-0
    x
}

// encodes two 16(!) bit numbers into a single 32bit number by interleaving the bits.
pub fn encode(x: u16, y: u16) -> u32 {
    (part_1by1(y as u32) << 1) + part_1by1(x as u32)
}
