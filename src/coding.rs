use crate::key::Key;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Serializes a scalar or small vector into the `meta` stream.
pub trait Encode {
    /// Serializes into a writer.
    fn encode_into<W: Write>(&self, writer: &mut W) -> io::Result<()>;
}

/// Deserializes a scalar or small vector from the `meta` stream.
pub trait Decode: Sized {
    /// Deserializes from a reader.
    fn decode_from<R: Read>(reader: &mut R) -> io::Result<Self>;
}

impl Encode for bool {
    fn encode_into<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(u8::from(*self))
    }
}

impl Decode for bool {
    fn decode_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(reader.read_u8()? != 0)
    }
}

impl Encode for u32 {
    fn encode_into<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(*self)
    }
}

impl Decode for u32 {
    fn decode_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_u32::<LittleEndian>()
    }
}

impl Encode for u64 {
    fn encode_into<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(*self)
    }
}

impl Decode for u64 {
    fn decode_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_u64::<LittleEndian>()
    }
}

impl Encode for Vec<u32> {
    fn encode_into<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        (self.len() as u64).encode_into(writer)?;
        for value in self {
            value.encode_into(writer)?;
        }
        Ok(())
    }
}

impl Decode for Vec<u32> {
    fn decode_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let len = u64::decode_from(reader)? as usize;
        let mut out = Vec::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            out.push(u32::decode_from(reader)?);
        }
        Ok(out)
    }
}

/// Writes a generic [`Key`] as little-endian bytes of exactly `K::BITS / 8` length.
pub fn encode_key<K: Key, W: Write>(key: K, writer: &mut W) -> io::Result<()> {
    let mut buf = [0u8; 8];
    let width = (K::BITS / 8) as usize;
    key.write_le(&mut buf[..width]);
    writer.write_all(&buf[..width])
}

/// Reads a generic [`Key`] from little-endian bytes of exactly `K::BITS / 8` length.
pub fn decode_key<K: Key, R: Read>(reader: &mut R) -> io::Result<K> {
    let mut buf = [0u8; 8];
    let width = (K::BITS / 8) as usize;
    reader.read_exact(&mut buf[..width])?;
    Ok(K::read_le(&buf[..width]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn roundtrip_scalars() {
        let mut buf = Vec::new();
        true.encode_into(&mut buf).unwrap();
        42u32.encode_into(&mut buf).unwrap();
        u64::MAX.encode_into(&mut buf).unwrap();

        let mut cursor = &buf[..];
        assert!(bool::decode_from(&mut cursor).unwrap());
        assert_eq!(42u32, u32::decode_from(&mut cursor).unwrap());
        assert_eq!(u64::MAX, u64::decode_from(&mut cursor).unwrap());
    }

    #[test]
    fn roundtrip_vec() {
        let v: Vec<u32> = vec![1, 2, 3, 4, 5];
        let mut buf = Vec::new();
        v.encode_into(&mut buf).unwrap();

        let mut cursor = &buf[..];
        let roundtripped = Vec::<u32>::decode_from(&mut cursor).unwrap();
        assert_eq!(v, roundtripped);
    }

    #[test]
    fn roundtrip_key() {
        let mut buf = Vec::new();
        encode_key(0xAABB_CCDDu32, &mut buf).unwrap();
        let mut cursor = &buf[..];
        assert_eq!(0xAABB_CCDDu32, decode_key::<u32, _>(&mut cursor).unwrap());

        let mut buf = Vec::new();
        encode_key(0x1122_3344_5566_7788u64, &mut buf).unwrap();
        let mut cursor = &buf[..];
        assert_eq!(
            0x1122_3344_5566_7788u64,
            decode_key::<u64, _>(&mut cursor).unwrap()
        );
    }
}
