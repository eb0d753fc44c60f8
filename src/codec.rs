use {
    super::*,
    bitcoin::opcodes::all::{OP_CHECKSIG, OP_DUP, OP_EQUALVERIFY, OP_HASH160},
};

/// The classic diff-1 target `0x00000000ffff0000...0`; pool difficulty 1 is
/// defined relative to this value.
pub static DIFF1: LazyLock<U256> =
    LazyLock::new(|| U256::from_big_endian(&Target::MAX.to_be_bytes()));

/// Scaling factor for the share-difficulty division. The scaled product
/// exceeds 256 bits, so the math runs in 512 bits.
const SHARE_DIFF_SCALE: u64 = 1_000_000_000_000_000_000;

pub fn bits_to_target(nbits: Nbits) -> U256 {
    U256::from_big_endian(&Target::from_compact(nbits.into()).to_be_bytes())
}

/// Canonical compact encoding: when the high byte of the mantissa would be
/// ≥ 0x80 the mantissa shifts right and the exponent increments, so the
/// compact value never reads as negative.
pub fn target_to_compact(target: U256) -> CompactTarget {
    Target::from_be_bytes(target.to_big_endian()).to_compact_lossy()
}

/// Interprets a hash rendered as hex (shorter input is padded on the right
/// to 32 bytes) as the little-endian 256-bit integer it encodes.
pub fn target_from_hash_hex(hash_hex: &str) -> Result<U256> {
    ensure!(hash_hex.len() <= 64, "hash hex longer than 32 bytes");
    let padded = format!("{hash_hex:0<64}");
    let mut bytes = <[u8; 32]>::from_hex(&padded)?;
    bytes.reverse();
    Ok(U256::from_big_endian(&bytes))
}

pub fn block_hash_to_u256(hash: BlockHash) -> U256 {
    U256::from_little_endian(&hash.to_byte_array())
}

/// `diff1 / value` carried out as `diff1 × 10^18 / value` in 512-bit
/// arithmetic, recovering the float at the end. Used both for job
/// difficulty (value = network target) and share difficulty (value = header
/// hash).
pub fn pool_difficulty(value: U256) -> f64 {
    if value.is_zero() {
        return f64::INFINITY;
    }

    let scaled = DIFF1.full_mul(U256::from(SHARE_DIFF_SCALE));
    u512_to_f64(scaled / U512::from(value)) / SHARE_DIFF_SCALE as f64
}

fn u512_to_f64(value: U512) -> f64 {
    let bits = value.bits();
    if bits <= 64 {
        return value.low_u64() as f64;
    }

    let shift = (bits - 53) as u32;
    (value >> shift).low_u64() as f64 * 2f64.powi(shift as i32)
}

/// Length-prefixed byte string in Bitcoin's compact-size framing.
pub fn var_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = consensus::serialize(&VarInt(bytes.len() as u64));
    out.extend_from_slice(bytes);
    out
}

/// BIP-34 style script number: a single opcode byte for 1..=16, otherwise a
/// length byte followed by the minimal little-endian encoding.
pub fn script_number(n: i64) -> Result<Vec<u8>> {
    ensure!(n >= 0, "script number must be non-negative");

    if (1..=16).contains(&n) {
        return Ok(vec![0x50 + n as u8]);
    }

    let mut buf = [0u8; 8];
    let len = write_scriptint(&mut buf, n);
    let mut out = Vec::with_capacity(len + 1);
    out.push(len as u8);
    out.extend_from_slice(&buf[..len]);
    Ok(out)
}

/// Decodes a pool or recipient address into its P2PKH output script.
/// CashAddr form is translated to the legacy payload first; base58check
/// failures then surface as errors.
pub fn address_to_script(address: &str) -> Result<ScriptBuf> {
    let payload = match bitcoin::base58::decode_check(address) {
        Ok(payload) => payload,
        Err(base58_err) => cashaddr_payload(address)
            .with_context(|| format!("invalid address '{address}': {base58_err}"))?,
    };

    ensure!(
        payload.len() == 21,
        "decoded address must be 25 bytes including checksum, got {}",
        payload.len() + 4
    );

    let hash: [u8; 20] = payload[1..21].try_into().expect("length checked above");

    Ok(script::Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script())
}

/// P2PK output script for proof-of-stake coins whose `validateaddress`
/// surfaces a raw compressed pubkey instead of an address.
pub fn pubkey_to_script(pubkey_hex: &str) -> Result<ScriptBuf> {
    ensure!(
        pubkey_hex.len() == 66,
        "invalid pubkey: expected 66 hex chars, got {}",
        pubkey_hex.len()
    );

    let pubkey = <[u8; 33]>::from_hex(pubkey_hex)?;

    Ok(script::Builder::new()
        .push_slice(pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script())
}

const CASHADDR_CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

fn cashaddr_polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x0007_ffff_ffff) << 5) ^ u64::from(d);
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

/// Decodes a CashAddr string to the legacy 21-byte payload (version byte
/// followed by hash160), equivalent to translating to base58 and decoding.
fn cashaddr_payload(address: &str) -> Result<Vec<u8>> {
    let address = address.to_lowercase();
    let (prefix, payload) = address
        .split_once(':')
        .unwrap_or(("bitcoincash", address.as_str()));

    let values = payload
        .bytes()
        .map(|b| {
            CASHADDR_CHARSET
                .iter()
                .position(|&c| c == b)
                .map(|i| i as u8)
                .ok_or_else(|| anyhow!("invalid cashaddr character '{}'", b as char))
        })
        .collect::<Result<Vec<u8>>>()?;

    ensure!(values.len() > 8, "cashaddr payload too short");

    let mut checked: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    checked.push(0);
    checked.extend_from_slice(&values);

    ensure!(
        cashaddr_polymod(&checked) == 0,
        "invalid cashaddr checksum"
    );

    // Regroup the 5-bit digits (checksum stripped) into bytes.
    let mut bytes = Vec::new();
    let mut acc: u32 = 0;
    let mut acc_bits = 0;
    for &value in &values[..values.len() - 8] {
        acc = (acc << 5) | u32::from(value);
        acc_bits += 5;
        if acc_bits >= 8 {
            acc_bits -= 8;
            bytes.push((acc >> acc_bits) as u8);
        }
    }
    ensure!(
        acc & ((1 << acc_bits) - 1) == 0,
        "non-zero cashaddr padding"
    );

    ensure!(bytes.len() == 21, "unsupported cashaddr hash size");

    let version_byte = bytes[0];
    let legacy_version = match version_byte >> 3 {
        0 => 0x00, // P2PKH
        1 => 0x05, // P2SH
        kind => bail!("unsupported cashaddr type {kind}"),
    };

    let mut payload = Vec::with_capacity(21);
    payload.push(legacy_version);
    payload.extend_from_slice(&bytes[1..]);
    Ok(payload)
}
