//! # 小端字节游标
//!
//! 二进制容器解码器共用的有界读取器。越界读取返回 `MalformedInput`，
//! 不会 panic。
//!
//! ## 依赖关系
//! - 被 `binary/ase.rs`, `binary/hdf5/format.rs` 使用
//! - 使用 `error.rs`

use crate::error::{Result, StructuraError};

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    format: &'static str,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], format: &'static str) -> Self {
        ByteCursor {
            data,
            pos: 0,
            format,
        }
    }

    /// 从指定偏移开始的游标
    pub fn at(data: &'a [u8], pos: u64, format: &'static str) -> Result<Self> {
        let mut cursor = ByteCursor::new(data, format);
        cursor.seek(pos)?;
        Ok(cursor)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        let pos = usize::try_from(pos).ok().filter(|p| *p <= self.data.len());
        match pos {
            Some(p) => {
                self.pos = p;
                Ok(())
            }
            None => Err(self.eof(0)),
        }
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn eof(&self, wanted: usize) -> StructuraError {
        StructuraError::malformed(
            self.format,
            format!(
                "unexpected end of data: need {} byte(s) at offset {} of {}",
                wanted,
                self.pos,
                self.data.len()
            ),
        )
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|e| *e <= self.data.len());
        match end {
            Some(end) => {
                let bytes = &self.data[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(self.eof(n)),
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// 读取 1/2/4/8 字节的无符号整数（HDF5 的偏移量与长度宽度可变）
    pub fn read_uint(&mut self, size: u8) -> Result<u64> {
        match size {
            1 => self.read_u8().map(u64::from),
            2 => self.read_u16().map(u64::from),
            4 => self.read_u32().map(u64::from),
            8 => self.read_u64(),
            other => Err(StructuraError::malformed(
                self.format,
                format!("unsupported integer width {}", other),
            )),
        }
    }

    /// 读取以 NUL 结尾的字符串（不含 NUL）
    pub fn read_cstr(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let len = rest.iter().position(|&b| b == 0).ok_or_else(|| self.eof(1))?;
        let text = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(text)
    }
}
